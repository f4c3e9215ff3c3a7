use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of people a member rule can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonType {
    /// Matches every subject, whatever its own type
    All,
    Teacher,
    Student,
    Administrative,
    LocalAuthority,
    Parent,
    Academic,
    InternshipTutor,
    CompanyManager,
    External,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
}

impl PersonType {
    pub const ALL_TYPES: [PersonType; 15] = [
        PersonType::All,
        PersonType::Teacher,
        PersonType::Student,
        PersonType::Administrative,
        PersonType::LocalAuthority,
        PersonType::Parent,
        PersonType::Academic,
        PersonType::InternshipTutor,
        PersonType::CompanyManager,
        PersonType::External,
        PersonType::Local1,
        PersonType::Local2,
        PersonType::Local3,
        PersonType::Local4,
        PersonType::Local5,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            PersonType::All => "ALL",
            PersonType::Teacher => "TEACHER",
            PersonType::Student => "STUDENT",
            PersonType::Administrative => "ADMINISTRATIVE",
            PersonType::LocalAuthority => "LOCAL_AUTHORITY",
            PersonType::Parent => "PARENT",
            PersonType::Academic => "ACADEMIC",
            PersonType::InternshipTutor => "INTERNSHIP_TUTOR",
            PersonType::CompanyManager => "COMPANY_MANAGER",
            PersonType::External => "EXTERNAL",
            PersonType::Local1 => "LOCAL1",
            PersonType::Local2 => "LOCAL2",
            PersonType::Local3 => "LOCAL3",
            PersonType::Local4 => "LOCAL4",
            PersonType::Local5 => "LOCAL5",
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PersonType::All)
    }
}

impl fmt::Display for PersonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PersonType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        PersonType::ALL_TYPES
            .into_iter()
            .find(|person_type| person_type.code() == normalized)
            .ok_or_else(|| DefinitionError::UnknownPersonType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("student".parse::<PersonType>().unwrap(), PersonType::Student);
        assert_eq!("Local3".parse::<PersonType>().unwrap(), PersonType::Local3);
        assert_eq!(
            "internship-tutor".parse::<PersonType>().unwrap(),
            PersonType::InternshipTutor
        );
        assert!("janitor".parse::<PersonType>().is_err());
    }

    #[test]
    fn test_codes_round_trip_through_serde_names() {
        for person_type in PersonType::ALL_TYPES {
            let yaml = serde_yaml::to_string(&person_type).unwrap();
            assert_eq!(yaml.trim(), person_type.code());
        }
    }
}
