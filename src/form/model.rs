//! Form record: the typed tree of questionnaire sections.
//!
//! Every answer lives in a `Field<T>`. `Field::Unset` is the explicit
//! "not answered" state; it serializes as `null` and a missing JSON key
//! deserializes to it, so partially filled records round-trip through the
//! store without losing the distinction between "no" and "never asked".

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single answer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Unset,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unset => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => serializer.serialize_some(v),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Field::from)
    }
}

/// Deserialize an enum answer, reading values it does not recognise as
/// `Unset` instead of failing the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Field<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()).into())
}

/// Gender as offered on the gender keyboard.
///
/// Records written by the first bot stored the button label itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[serde(alias = "Мужской")]
    Male,
    #[serde(alias = "Женский")]
    Female,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Мужской",
            Self::Female => "Женский",
        }
    }
}

/// Discriminator controlling which foreign-only steps are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenshipType {
    Domestic,
    Foreign,
}

impl CitizenshipType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Domestic => "Гражданин РФ",
            Self::Foreign => "Иностранный гражданин",
        }
    }
}

/// Reference to an attachment saved on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalData {
    pub surname: Field<String>,
    pub name: Field<String>,
    pub patronymic: Field<String>,
    pub birth_date: Field<String>,
    pub birth_place: Field<String>,
    pub citizenship: Field<String>,
    #[serde(deserialize_with = "lenient")]
    pub gender: Field<Gender>,
    pub photo_3x4: Field<FileRef>,
}

impl PersonalData {
    pub fn is_filled(&self) -> bool {
        self.surname.is_set()
            || self.name.is_set()
            || self.patronymic.is_set()
            || self.birth_date.is_set()
            || self.birth_place.is_set()
            || self.citizenship.is_set()
            || self.gender.is_set()
            || self.photo_3x4.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassportData {
    pub series_number: Field<String>,
    pub issued_by: Field<String>,
    pub issue_date: Field<String>,
    pub division_code: Field<String>,
    pub registration_address: Field<String>,
    pub actual_address: Field<String>,
    pub additional: Field<String>,
    pub photo: Field<FileRef>,
}

impl PassportData {
    pub fn is_filled(&self) -> bool {
        self.series_number.is_set()
            || self.issued_by.is_set()
            || self.issue_date.is_set()
            || self.division_code.is_set()
            || self.registration_address.is_set()
            || self.actual_address.is_set()
            || self.additional.is_set()
            || self.photo.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contacts {
    pub phone: Field<String>,
    pub email: Field<String>,
    pub social_media: Field<String>,
}

impl Contacts {
    pub fn is_filled(&self) -> bool {
        self.phone.is_set() || self.email.is_set() || self.social_media.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Documents {
    pub medical_book: Field<bool>,
    pub registration: Field<bool>,
    pub snils: Field<String>,
    pub inn: Field<String>,
    pub medical_book_file: Field<FileRef>,
    // Foreign citizens only.
    pub foreigner_id: Field<String>,
    pub fingerprinting: Field<bool>,
    pub medical_exam: Field<bool>,
    pub registry_check: Field<bool>,
}

impl Documents {
    pub fn is_filled(&self) -> bool {
        self.medical_book.is_set()
            || self.registration.is_set()
            || self.snils.is_set()
            || self.inn.is_set()
            || self.medical_book_file.is_set()
            || self.foreigner_id.is_set()
            || self.fingerprinting.is_set()
            || self.medical_exam.is_set()
            || self.registry_check.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub institution: Field<String>,
    pub period: Field<String>,
    pub specialty: Field<String>,
    pub document: Field<String>,
    pub diploma: Field<FileRef>,
}

impl Education {
    pub fn is_filled(&self) -> bool {
        self.institution.is_set()
            || self.period.is_set()
            || self.specialty.is_set()
            || self.document.is_set()
            || self.diploma.is_set()
    }
}

/// One repeatable work-experience block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkEntry {
    pub period: Field<String>,
    pub organization: Field<String>,
    pub position: Field<String>,
    pub duties: Field<String>,
}

impl WorkEntry {
    pub fn is_filled(&self) -> bool {
        self.period.is_set()
            || self.organization.is_set()
            || self.position.is_set()
            || self.duties.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Readiness {
    pub track: Field<String>,
    pub start_date: Field<String>,
    pub business_trips: Field<bool>,
    pub city: Field<String>,
}

impl Readiness {
    pub fn is_filled(&self) -> bool {
        self.track.is_set()
            || self.start_date.is_set()
            || self.business_trips.is_set()
            || self.city.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consents {
    pub personal_data: Field<bool>,
    pub rotation: Field<bool>,
}

impl Consents {
    pub fn is_filled(&self) -> bool {
        self.personal_data.is_set() || self.rotation.is_set()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Confirmations {
    pub tuberculosis: Field<bool>,
    pub chronic_diseases: Field<bool>,
    pub russia_stay: Field<bool>,
    #[serde(rename = "90_days_warning")]
    pub ninety_days_warning: Field<bool>,
    pub documents_readiness: Field<bool>,
    pub self_employment: Field<bool>,
    pub compensation: Field<bool>,
}

impl Confirmations {
    pub fn is_filled(&self) -> bool {
        self.tuberculosis.is_set()
            || self.chronic_diseases.is_set()
            || self.russia_stay.is_set()
            || self.ninety_days_warning.is_set()
            || self.documents_readiness.is_set()
            || self.self_employment.is_set()
            || self.compensation.is_set()
    }
}

/// Top-level sections of the questionnaire, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Personal,
    Passport,
    Contacts,
    Documents,
    Education,
    WorkExperience,
    Readiness,
    Consents,
    Comments,
    Confirmations,
}

impl Section {
    pub const ALL: [Section; 10] = [
        Section::Personal,
        Section::Passport,
        Section::Contacts,
        Section::Documents,
        Section::Education,
        Section::WorkExperience,
        Section::Readiness,
        Section::Consents,
        Section::Comments,
        Section::Confirmations,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Personal => "Личные данные",
            Self::Passport => "Паспортные данные",
            Self::Contacts => "Контактная информация",
            Self::Documents => "Документы и разрешения",
            Self::Education => "Образование",
            Self::WorkExperience => "Опыт работы",
            Self::Readiness => "Готовность к работе",
            Self::Consents => "Согласия",
            Self::Comments => "Комментарии",
            Self::Confirmations => "Подтверждения",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Personal => "👤",
            Self::Passport => "📄",
            Self::Contacts => "📞",
            Self::Documents => "📋",
            Self::Education => "🎓",
            Self::WorkExperience => "💼",
            Self::Readiness => "⭐",
            Self::Consents => "✅",
            Self::Comments => "💬",
            Self::Confirmations => "🔒",
        }
    }

    /// Stable key used in callback tokens (`section:<key>`).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Passport => "passport",
            Self::Contacts => "contacts",
            Self::Documents => "documents",
            Self::Education => "education",
            Self::WorkExperience => "work_experience",
            Self::Readiness => "readiness",
            Self::Consents => "consents",
            Self::Comments => "comments",
            Self::Confirmations => "confirmations",
        }
    }

    pub fn from_key(key: &str) -> Option<Section> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Free-text answers, addressed independently of their section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Surname,
    Name,
    Patronymic,
    BirthDate,
    BirthPlace,
    Citizenship,
    PassportSeriesNumber,
    PassportIssuedBy,
    PassportIssueDate,
    PassportDivisionCode,
    RegistrationAddress,
    ActualAddress,
    PassportAdditional,
    Phone,
    Email,
    SocialMedia,
    Snils,
    Inn,
    ForeignerId,
    EducationInstitution,
    EducationPeriod,
    EducationSpecialty,
    EducationDocument,
    Track,
    StartDate,
    City,
    Comments,
}

/// Yes/no answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    MedicalBook,
    Registration,
    Fingerprinting,
    MedicalExam,
    RegistryCheck,
    BusinessTrips,
    PersonalDataConsent,
    RotationConsent,
    Tuberculosis,
    ChronicDiseases,
    RussiaStay,
    NinetyDaysWarning,
    DocumentsReadiness,
    SelfEmployment,
    Compensation,
}

/// Attachment answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileField {
    Photo3x4,
    PassportPhoto,
    MedicalBookFile,
    Diploma,
}

impl FileField {
    /// Base file name used when the attachment is stored on disk.
    pub fn stem(&self) -> &'static str {
        match self {
            Self::Photo3x4 => "photo_3x4",
            Self::PassportPhoto => "passport_photo",
            Self::MedicalBookFile => "medical_book",
            Self::Diploma => "diploma",
        }
    }
}

/// Fields of a work-experience entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkField {
    Period,
    Organization,
    Position,
    Duties,
}

/// The whole questionnaire for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_data: Option<PersonalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_data: Option<PassportData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Contacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Documents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Education>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub work_experience: Vec<WorkEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consents: Option<Consents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<Confirmations>,
    #[serde(default)]
    pub comments: Field<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub citizenship_type: Field<CitizenshipType>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no section holds an answer and no citizenship type is chosen.
    pub fn is_empty(&self) -> bool {
        !self.citizenship_type.is_set()
            && Section::ALL.iter().all(|s| !self.is_section_filled(*s))
    }

    pub fn is_foreign(&self) -> bool {
        self.citizenship_type.get() == Some(&CitizenshipType::Foreign)
    }

    /// A section counts as filled when any one of its fields is set.
    pub fn is_section_filled(&self, section: Section) -> bool {
        match section {
            Section::Personal => self.personal_data.as_ref().is_some_and(PersonalData::is_filled),
            Section::Passport => self.passport_data.as_ref().is_some_and(PassportData::is_filled),
            Section::Contacts => self.contacts.as_ref().is_some_and(Contacts::is_filled),
            Section::Documents => self.documents.as_ref().is_some_and(Documents::is_filled),
            Section::Education => self.education.as_ref().is_some_and(Education::is_filled),
            Section::WorkExperience => self.work_experience.iter().any(WorkEntry::is_filled),
            Section::Readiness => self.readiness.as_ref().is_some_and(Readiness::is_filled),
            Section::Consents => self.consents.as_ref().is_some_and(Consents::is_filled),
            Section::Comments => self.comments.is_set(),
            Section::Confirmations => {
                self.confirmations.as_ref().is_some_and(Confirmations::is_filled)
            }
        }
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        use TextField::*;
        let slot = match field {
            Surname => self.personal_data.as_ref().map(|s| &s.surname),
            Name => self.personal_data.as_ref().map(|s| &s.name),
            Patronymic => self.personal_data.as_ref().map(|s| &s.patronymic),
            BirthDate => self.personal_data.as_ref().map(|s| &s.birth_date),
            BirthPlace => self.personal_data.as_ref().map(|s| &s.birth_place),
            Citizenship => self.personal_data.as_ref().map(|s| &s.citizenship),
            PassportSeriesNumber => self.passport_data.as_ref().map(|s| &s.series_number),
            PassportIssuedBy => self.passport_data.as_ref().map(|s| &s.issued_by),
            PassportIssueDate => self.passport_data.as_ref().map(|s| &s.issue_date),
            PassportDivisionCode => self.passport_data.as_ref().map(|s| &s.division_code),
            RegistrationAddress => self.passport_data.as_ref().map(|s| &s.registration_address),
            ActualAddress => self.passport_data.as_ref().map(|s| &s.actual_address),
            PassportAdditional => self.passport_data.as_ref().map(|s| &s.additional),
            Phone => self.contacts.as_ref().map(|s| &s.phone),
            Email => self.contacts.as_ref().map(|s| &s.email),
            SocialMedia => self.contacts.as_ref().map(|s| &s.social_media),
            Snils => self.documents.as_ref().map(|s| &s.snils),
            Inn => self.documents.as_ref().map(|s| &s.inn),
            ForeignerId => self.documents.as_ref().map(|s| &s.foreigner_id),
            EducationInstitution => self.education.as_ref().map(|s| &s.institution),
            EducationPeriod => self.education.as_ref().map(|s| &s.period),
            EducationSpecialty => self.education.as_ref().map(|s| &s.specialty),
            EducationDocument => self.education.as_ref().map(|s| &s.document),
            Track => self.readiness.as_ref().map(|s| &s.track),
            StartDate => self.readiness.as_ref().map(|s| &s.start_date),
            City => self.readiness.as_ref().map(|s| &s.city),
            Comments => Some(&self.comments),
        };
        slot.and_then(Field::get).map(String::as_str)
    }

    pub fn set_text(&mut self, field: TextField, value: String) {
        use TextField::*;
        let slot = match field {
            Surname => &mut self.personal_data.get_or_insert_with(Default::default).surname,
            Name => &mut self.personal_data.get_or_insert_with(Default::default).name,
            Patronymic => &mut self.personal_data.get_or_insert_with(Default::default).patronymic,
            BirthDate => &mut self.personal_data.get_or_insert_with(Default::default).birth_date,
            BirthPlace => &mut self.personal_data.get_or_insert_with(Default::default).birth_place,
            Citizenship => &mut self.personal_data.get_or_insert_with(Default::default).citizenship,
            PassportSeriesNumber => {
                &mut self.passport_data.get_or_insert_with(Default::default).series_number
            }
            PassportIssuedBy => &mut self.passport_data.get_or_insert_with(Default::default).issued_by,
            PassportIssueDate => {
                &mut self.passport_data.get_or_insert_with(Default::default).issue_date
            }
            PassportDivisionCode => {
                &mut self.passport_data.get_or_insert_with(Default::default).division_code
            }
            RegistrationAddress => {
                &mut self.passport_data.get_or_insert_with(Default::default).registration_address
            }
            ActualAddress => {
                &mut self.passport_data.get_or_insert_with(Default::default).actual_address
            }
            PassportAdditional => {
                &mut self.passport_data.get_or_insert_with(Default::default).additional
            }
            Phone => &mut self.contacts.get_or_insert_with(Default::default).phone,
            Email => &mut self.contacts.get_or_insert_with(Default::default).email,
            SocialMedia => &mut self.contacts.get_or_insert_with(Default::default).social_media,
            Snils => &mut self.documents.get_or_insert_with(Default::default).snils,
            Inn => &mut self.documents.get_or_insert_with(Default::default).inn,
            ForeignerId => &mut self.documents.get_or_insert_with(Default::default).foreigner_id,
            EducationInstitution => {
                &mut self.education.get_or_insert_with(Default::default).institution
            }
            EducationPeriod => &mut self.education.get_or_insert_with(Default::default).period,
            EducationSpecialty => &mut self.education.get_or_insert_with(Default::default).specialty,
            EducationDocument => &mut self.education.get_or_insert_with(Default::default).document,
            Track => &mut self.readiness.get_or_insert_with(Default::default).track,
            StartDate => &mut self.readiness.get_or_insert_with(Default::default).start_date,
            City => &mut self.readiness.get_or_insert_with(Default::default).city,
            Comments => &mut self.comments,
        };
        *slot = Field::Set(value);
    }

    pub fn flag(&self, field: FlagField) -> Option<bool> {
        use FlagField::*;
        let slot = match field {
            MedicalBook => self.documents.as_ref().map(|s| &s.medical_book),
            Registration => self.documents.as_ref().map(|s| &s.registration),
            Fingerprinting => self.documents.as_ref().map(|s| &s.fingerprinting),
            MedicalExam => self.documents.as_ref().map(|s| &s.medical_exam),
            RegistryCheck => self.documents.as_ref().map(|s| &s.registry_check),
            BusinessTrips => self.readiness.as_ref().map(|s| &s.business_trips),
            PersonalDataConsent => self.consents.as_ref().map(|s| &s.personal_data),
            RotationConsent => self.consents.as_ref().map(|s| &s.rotation),
            Tuberculosis => self.confirmations.as_ref().map(|s| &s.tuberculosis),
            ChronicDiseases => self.confirmations.as_ref().map(|s| &s.chronic_diseases),
            RussiaStay => self.confirmations.as_ref().map(|s| &s.russia_stay),
            NinetyDaysWarning => self.confirmations.as_ref().map(|s| &s.ninety_days_warning),
            DocumentsReadiness => self.confirmations.as_ref().map(|s| &s.documents_readiness),
            SelfEmployment => self.confirmations.as_ref().map(|s| &s.self_employment),
            Compensation => self.confirmations.as_ref().map(|s| &s.compensation),
        };
        slot.and_then(Field::get).copied()
    }

    pub fn set_flag(&mut self, field: FlagField, value: bool) {
        use FlagField::*;
        let slot = match field {
            MedicalBook => &mut self.documents.get_or_insert_with(Default::default).medical_book,
            Registration => &mut self.documents.get_or_insert_with(Default::default).registration,
            Fingerprinting => {
                &mut self.documents.get_or_insert_with(Default::default).fingerprinting
            }
            MedicalExam => &mut self.documents.get_or_insert_with(Default::default).medical_exam,
            RegistryCheck => {
                &mut self.documents.get_or_insert_with(Default::default).registry_check
            }
            BusinessTrips => {
                &mut self.readiness.get_or_insert_with(Default::default).business_trips
            }
            PersonalDataConsent => {
                &mut self.consents.get_or_insert_with(Default::default).personal_data
            }
            RotationConsent => &mut self.consents.get_or_insert_with(Default::default).rotation,
            Tuberculosis => {
                &mut self.confirmations.get_or_insert_with(Default::default).tuberculosis
            }
            ChronicDiseases => {
                &mut self.confirmations.get_or_insert_with(Default::default).chronic_diseases
            }
            RussiaStay => &mut self.confirmations.get_or_insert_with(Default::default).russia_stay,
            NinetyDaysWarning => {
                &mut self.confirmations.get_or_insert_with(Default::default).ninety_days_warning
            }
            DocumentsReadiness => {
                &mut self.confirmations.get_or_insert_with(Default::default).documents_readiness
            }
            SelfEmployment => {
                &mut self.confirmations.get_or_insert_with(Default::default).self_employment
            }
            Compensation => {
                &mut self.confirmations.get_or_insert_with(Default::default).compensation
            }
        };
        *slot = Field::Set(value);
    }

    pub fn file(&self, field: FileField) -> Option<&FileRef> {
        let slot = match field {
            FileField::Photo3x4 => self.personal_data.as_ref().map(|s| &s.photo_3x4),
            FileField::PassportPhoto => self.passport_data.as_ref().map(|s| &s.photo),
            FileField::MedicalBookFile => self.documents.as_ref().map(|s| &s.medical_book_file),
            FileField::Diploma => self.education.as_ref().map(|s| &s.diploma),
        };
        slot.and_then(Field::get)
    }

    pub fn set_file(&mut self, field: FileField, value: FileRef) {
        let slot = match field {
            FileField::Photo3x4 => {
                &mut self.personal_data.get_or_insert_with(Default::default).photo_3x4
            }
            FileField::PassportPhoto => {
                &mut self.passport_data.get_or_insert_with(Default::default).photo
            }
            FileField::MedicalBookFile => {
                &mut self.documents.get_or_insert_with(Default::default).medical_book_file
            }
            FileField::Diploma => &mut self.education.get_or_insert_with(Default::default).diploma,
        };
        *slot = Field::Set(value);
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.personal_data.get_or_insert_with(Default::default).gender = Field::Set(gender);
    }

    pub fn set_citizenship_type(&mut self, kind: CitizenshipType) {
        self.citizenship_type = Field::Set(kind);
    }

    /// Append an empty work entry and return its index.
    pub fn push_work_entry(&mut self) -> usize {
        self.work_experience.push(WorkEntry::default());
        self.work_experience.len() - 1
    }

    /// Remove work entries with no field answered. Returns true if any were removed.
    pub fn drop_empty_work_entries(&mut self) -> bool {
        let before = self.work_experience.len();
        self.work_experience.retain(WorkEntry::is_filled);
        self.work_experience.len() != before
    }

    /// Write a field of an existing work entry. Returns false if `index` is out of range.
    pub fn set_work(&mut self, index: usize, field: WorkField, value: String) -> bool {
        let Some(entry) = self.work_experience.get_mut(index) else {
            return false;
        };
        let slot = match field {
            WorkField::Period => &mut entry.period,
            WorkField::Organization => &mut entry.organization,
            WorkField::Position => &mut entry.position,
            WorkField::Duties => &mut entry.duties,
        };
        *slot = Field::Set(value);
        true
    }

    /// "Surname Name Patronymic" from whatever parts are set.
    pub fn full_name(&self) -> String {
        [TextField::Surname, TextField::Name, TextField::Patronymic]
            .into_iter()
            .filter_map(|f| self.text(f))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
