use crate::profile::profile_model::UserProfile;

// ============================================================================
// Prompt-context rendering for the mapping service
// ============================================================================

/// Render the whole profile as plain text for a full-form analysis.
pub fn full_context(profile: &UserProfile) -> String {
    let p = &profile.personal_info;
    let mut lines = vec![
        "=== USER PROFILE ===".to_string(),
        format!("Name: {}", profile.full_name()),
        format!("Email: {}", p.email),
    ];
    if !p.phone.is_empty() {
        lines.push(format!("Phone: {}", p.phone));
    }
    let addr = &p.address;
    if !addr.city.is_empty() || !addr.country.is_empty() {
        lines.push(format!(
            "Address: {}, {}, {} {}, {}",
            addr.street, addr.city, addr.state, addr.zip_code, addr.country
        ));
    }
    for (label, url) in [
        ("LinkedIn", &p.linkedin_url),
        ("GitHub", &p.github_url),
        ("Portfolio", &p.portfolio_url),
    ] {
        if !url.is_empty() {
            lines.push(format!("{}: {}", label, url));
        }
    }

    if !profile.experience.is_empty() {
        lines.push("\nWork Experience:".to_string());
        for (i, exp) in profile.experience.iter().enumerate() {
            lines.push(format!(
                "  {}. {} at {} ({} - {})",
                i + 1,
                exp.title,
                exp.company,
                exp.start_date,
                exp.end_date
            ));
        }
    }
    if !profile.education.is_empty() {
        lines.push("\nEducation:".to_string());
        for edu in &profile.education {
            lines.push(format!(
                "  {} in {}, {}",
                edu.degree, edu.field, edu.institution
            ));
        }
    }
    if !profile.certifications.is_empty() {
        lines.push(format!(
            "\nCertifications: {}",
            profile.certifications.join(", ")
        ));
    }
    if !profile.languages.is_empty() {
        let langs: Vec<String> = profile
            .languages
            .iter()
            .map(|l| {
                if l.proficiency.is_empty() {
                    l.language.clone()
                } else {
                    format!("{} ({})", l.language, l.proficiency)
                }
            })
            .collect();
        lines.push(format!("\nLanguages: {}", langs.join(", ")));
    }
    if !profile.skills.technical.is_empty() {
        lines.push(format!("\nSkills: {}", profile.skills.technical.join(", ")));
    }

    let auth = &profile.work_authorization;
    lines.push(format!(
        "\nWork authorization: authorized={}, requires_sponsorship={}",
        auth.authorized, auth.requires_sponsorship
    ));
    if !profile.common_answers.hear_about_us.is_empty() {
        lines.push(format!(
            "How did you hear about us: {}",
            profile.common_answers.hear_about_us
        ));
    }
    for (question, answer) in &profile.common_answers.extra {
        lines.push(format!("{}: {}", question, answer));
    }

    lines.join("\n")
}

/// Render a context scoped to a single profile-list entry, for section-entry
/// analysis. Returns `None` when the index is out of range or the key is
/// unknown.
pub fn entry_context(profile: &UserProfile, profile_key: &str, idx: usize) -> Option<String> {
    let mut lines = vec![
        "=== USER PROFILE (single entry) ===".to_string(),
        format!("Name: {}", profile.full_name()),
        format!(
            "\nFill the fields with ONLY this specific entry (entry #{}):",
            idx + 1
        ),
    ];

    match profile_key {
        "experience" => {
            let exp = profile.experience.get(idx)?;
            lines.push(format!("Job Title: {}", exp.title));
            lines.push(format!("Company: {}", exp.company));
            if !exp.location.is_empty() {
                lines.push(format!("Location: {}", exp.location));
            }
            if !exp.start_date.is_empty() {
                lines.push(format!("Start Date: {}", exp.start_date));
            }
            if !exp.end_date.is_empty() {
                lines.push(format!("End Date: {}", exp.end_date));
            }
            if !exp.description.is_empty() {
                lines.push(format!("Description: {}", exp.description));
            }
        }
        "education" => {
            let edu = profile.education.get(idx)?;
            lines.push(format!("Degree: {}", edu.degree));
            lines.push(format!("Field of Study: {}", edu.field));
            lines.push(format!("Institution: {}", edu.institution));
            if !edu.gpa.is_empty() {
                lines.push(format!("GPA: {}", edu.gpa));
            }
            if !edu.start_date.is_empty() {
                lines.push(format!("Start Date: {}", edu.start_date));
            }
            if !edu.end_date.is_empty() {
                lines.push(format!("End Date: {}", edu.end_date));
            }
        }
        "certifications" => {
            let cert = profile.certifications.get(idx)?;
            lines.push(format!("Certification: {}", cert));
        }
        "languages" => {
            let lang = profile.languages.get(idx)?;
            lines.push(format!("Language: {}", lang.language));
            if !lang.proficiency.is_empty() {
                lines.push(format!("Proficiency: {}", lang.proficiency));
            }
        }
        _ => return None,
    }

    Some(lines.join("\n"))
}
