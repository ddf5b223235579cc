use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::Question;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Test {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub sections: Json<Vec<Section>>,
    pub proctoring: Json<ProctoringConfig>,
    pub is_active: bool,
    pub allowed_student_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Test {
    /// Sections in the order students take them.
    pub fn ordered_sections(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.0.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }

    pub fn section_at(&self, index: usize) -> Option<&Section> {
        self.ordered_sections().get(index).copied()
    }

    pub fn is_invited(&self, student_id: Uuid) -> bool {
        self.allowed_student_ids.contains(&student_id)
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date && now <= self.end_date
    }

    pub fn find_question(&self, question_id: Uuid) -> Option<(&Section, &Question)> {
        self.sections.0.iter().find_map(|s| {
            s.questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (s, q))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub time_limit_minutes: i32,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProctoringConfig {
    pub camera: bool,
    pub full_screen: bool,
    pub block_copy_paste: bool,
    pub block_right_click: bool,
}
