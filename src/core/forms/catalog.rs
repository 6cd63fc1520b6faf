use serde::Deserialize;

use super::model::FieldOption;

/// Canonical option lists used to repair dropdowns that arrive without options.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Catalog {
    #[serde(default = "default_circles")]
    pub circles: Vec<String>,
    #[serde(default = "default_activities")]
    pub activities: Vec<String>,
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,
    #[serde(default = "default_allocations")]
    pub allocations: Vec<String>,
    #[serde(default = "default_forward_outcomes")]
    pub forward_outcomes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_circles() -> Vec<String> {
    strings(&[
        "BH", "CG", "JH", "RJ", "WB", "NESA", "OR", "KK", "MP", "HR", "UP East", "PB", "MG", "JK",
        "DL", "TN", "KL", "HP", "UP West", "AP", "GUJ",
    ])
}

fn default_activities() -> Vec<String> {
    strings(&[
        "BFS",
        "PLVA",
        "TLVA",
        "PLVA + STR",
        "TLVA + STR",
        "Verticality",
        "ALS",
        "RR",
        "JV - Thar",
        "RR Str.",
        "JV",
        "BFS Str.",
        "Civil Survey + Dwgs.",
        "Foundation Design",
        "Foundation Str.",
    ])
}

fn default_clients() -> Vec<String> {
    strings(&["Indus", "ATC", "Sitel", "Other"])
}

fn default_allocations() -> Vec<String> {
    strings(&["Single", "Bulk", "Auto"])
}

fn default_forward_outcomes() -> Vec<String> {
    strings(&["Yes", "No"])
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            circles: default_circles(),
            activities: default_activities(),
            clients: default_clients(),
            allocations: default_allocations(),
            forward_outcomes: default_forward_outcomes(),
        }
    }
}

impl Catalog {
    /// Semantic field-id keywords and their lists, in matching order.
    pub fn keyword_lists(&self) -> [(&'static str, &[String]); 4] {
        [
            ("circle", self.circles.as_slice()),
            ("activity", self.activities.as_slice()),
            ("client", self.clients.as_slice()),
            ("allocation", self.allocations.as_slice()),
        ]
    }

    pub fn options_from(labels: &[String]) -> Vec<FieldOption> {
        labels.iter().map(|l| FieldOption::new(l)).collect()
    }
}
