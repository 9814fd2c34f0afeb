use serde::{Deserialize, Serialize};

// ============================================================================
// User profile — the data every fill draws from (loaded from YAML)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub linkedin_url: String,
    #[serde(default)]
    pub github_url: String,
    #[serde(default)]
    pub portfolio_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    #[serde(default)]
    pub field: String,
    pub institution: String,
    #[serde(default)]
    pub gpa: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
    #[serde(default)]
    pub proficiency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub technical: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkAuthorization {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub requires_sponsorship: bool,
    #[serde(default)]
    pub visa_status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonAnswers {
    #[serde(default)]
    pub hear_about_us: String,
    #[serde(default)]
    pub extra: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub work_authorization: WorkAuthorization,
    #[serde(default)]
    pub common_answers: CommonAnswers,
}

impl UserProfile {
    /// Load a profile from a YAML file.
    pub fn load(path: &std::path::Path) -> Result<UserProfile, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ProfileError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.personal_info.first_name, self.personal_info.last_name
        )
        .trim()
        .to_string()
    }

    /// Number of entries in the profile list a section fills from.
    pub fn entry_count(&self, profile_key: &str) -> usize {
        match profile_key {
            "experience" => self.experience.len(),
            "education" => self.education.len(),
            "certifications" => self.certifications.len(),
            "languages" => self.languages.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}
