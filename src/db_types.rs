use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CandidateRecord {
    pub id: i64,
    pub name: String,
    pub skills: String,
    pub education: String,
    pub certifications: String,
    pub experience: String,
    pub email: String,
    pub phone_number: String,
    pub linkedin: String,
    /// Resume fit score, 0-100. Zero until a resume has been scored.
    pub score: i32,
    pub status: String,
}

/// A candidate row before it has been assigned an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewCandidate {
    pub name: String,
    pub skills: String,
    pub education: String,
    pub certifications: String,
    pub experience: String,
    pub email: String,
    pub phone_number: String,
    pub linkedin: String,
    pub score: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct JobDescriptionRecord {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub employment_type: String,
    pub salary: String,
    pub experience: String,
    pub description: String,
    pub requirements: String,
    pub responsibilities: String,
    pub skills: String,
    pub benefits: String,
}

impl JobDescriptionRecord {
    /// Flatten the stored fields back into text the resume scorer can read.
    pub fn as_prompt_text(&self) -> String {
        format!(
            "Title: {}\nCompany: {}\nLocation: {}\nType: {}\nSalary: {}\nExperience: {}\nDescription: {}\nRequirements: {}\nResponsibilities: {}\nSkills: {}\nBenefits: {}",
            self.title,
            self.company,
            self.location,
            self.employment_type,
            self.salary,
            self.experience,
            self.description,
            self.requirements,
            self.responsibilities,
            self.skills,
            self.benefits,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewJobDescription {
    pub title: String,
    pub company: String,
    pub location: String,
    pub employment_type: String,
    pub salary: String,
    pub experience: String,
    pub description: String,
    pub requirements: String,
    pub responsibilities: String,
    pub skills: String,
    pub benefits: String,
}
