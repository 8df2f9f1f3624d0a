//! Patient models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Date format used for `dob`.
pub const DOB_FORMAT: &str = "%Y-%m-%d";

/// Patient gender as captured at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    Other,
    /// Not selected, or a value this version does not know.
    #[default]
    Unspecified,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::Unspecified => "",
        }
    }
}

impl From<String> for Gender {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "other" => Gender::Other,
            _ => Gender::Unspecified,
        }
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        gender.as_str().to_string()
    }
}

/// A registered patient.
///
/// Also used as the snapshot embedded in a bill, so it serializes its
/// store id alongside the identity fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Store document id
    #[serde(default)]
    pub id: String,
    /// Clinic-assigned MR number
    #[serde(default)]
    pub mr_no: String,
    /// Full name
    #[serde(default)]
    pub name: String,
    /// Contact phone
    #[serde(default)]
    pub phone: String,
    /// Date of birth (`YYYY-MM-DD`)
    #[serde(default)]
    pub dob: String,
    /// Gender
    #[serde(default)]
    pub gender: Gender,
    /// Age in whole years, derived from `dob`
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: u32,
    /// Postal address
    #[serde(default)]
    pub address: String,
    /// Server-assigned registration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Patient {
    /// One-line label for pick lists: `Name (Gender, Age y)`.
    pub fn summary(&self) -> String {
        format!("{} ({}, {}y)", self.name, self.gender.as_str(), self.age)
    }
}

/// Parse a `YYYY-MM-DD` date of birth.
pub fn parse_dob(dob: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(dob.trim(), DOB_FORMAT).ok()
}

/// Age in whole years on `today`, never negative.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Ages were written as numbers by registration and as strings by edits.
fn lenient_age<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u32).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        parse_dob(s).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        assert_eq!(age_on(date("1990-06-15"), date("2024-06-14")), 33);
        assert_eq!(age_on(date("1990-06-15"), date("2024-06-15")), 34);
        assert_eq!(age_on(date("1990-06-15"), date("2024-12-01")), 34);
    }

    #[test]
    fn test_age_never_negative() {
        assert_eq!(age_on(date("2030-01-01"), date("2024-01-01")), 0);
    }

    #[test]
    fn test_parse_dob_rejects_garbage() {
        assert!(parse_dob("15/06/1990").is_none());
        assert!(parse_dob("").is_none());
    }

    #[test]
    fn test_gender_roundtrip_and_unknown() {
        assert_eq!(Gender::from("female".to_string()), Gender::Female);
        assert_eq!(Gender::from("".to_string()), Gender::Unspecified);
        assert_eq!(String::from(Gender::Male), "Male");
    }

    #[test]
    fn test_patient_from_legacy_json() {
        let patient: Patient = serde_json::from_value(json!({
            "id": "p1",
            "mrNo": "MR-9",
            "name": "Kavya",
            "gender": "Female",
            "age": "27",
        }))
        .unwrap();

        assert_eq!(patient.mr_no, "MR-9");
        assert_eq!(patient.age, 27);
        assert_eq!(patient.gender, Gender::Female);
        assert_eq!(patient.phone, "");
        assert_eq!(patient.summary(), "Kavya (Female, 27y)");
    }

    #[test]
    fn test_patient_serializes_camel_case() {
        let patient = Patient {
            id: "p1".into(),
            mr_no: "MR-1".into(),
            name: "Arun".into(),
            age: 40,
            ..Default::default()
        };
        let value = serde_json::to_value(&patient).unwrap();
        assert_eq!(value["mrNo"], "MR-1");
        assert_eq!(value["age"], 40);
        assert!(value.get("createdAt").is_none());
    }
}
