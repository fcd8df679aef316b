use std::collections::HashMap;

use indexmap::IndexSet;

use crate::player::PlayerId;

/// How survivors are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMode {
    /// Every spleefer for themselves; the last one standing wins.
    FreeForAll,
    /// Spleefers play in labelled teams; the last team standing wins.
    Teams(Vec<String>),
}

impl GameMode {
    /// Team mode as soon as at least one team label is configured.
    pub fn from_labels(labels: Vec<String>) -> Self {
        if labels.is_empty() {
            GameMode::FreeForAll
        } else {
            GameMode::Teams(labels)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GameMode::FreeForAll => "standard",
            GameMode::Teams(_) => "team",
        }
    }

    /// The configured label matching `name`, ignoring case.
    pub fn team_label(&self, name: &str) -> Option<&str> {
        match self {
            GameMode::FreeForAll => None,
            GameMode::Teams(labels) => labels
                .iter()
                .find(|l| l.eq_ignore_ascii_case(name))
                .map(String::as_str),
        }
    }

    /// Give every player without a team a place in the smallest team.
    /// Ties go to the team listed first.
    pub fn assign_teams(&self, roster: &[PlayerId], teams: &mut HashMap<PlayerId, String>) {
        let GameMode::Teams(labels) = self else {
            return;
        };
        for id in roster {
            if teams.contains_key(id) {
                continue;
            }
            let smallest = labels
                .iter()
                .min_by_key(|label| teams.values().filter(|t| t == label).count());
            if let Some(label) = smallest {
                teams.insert(*id, label.clone());
            }
        }
    }

    /// Whether a started round is decided, given the survivors, everyone
    /// who took part (eliminated and departed players included) and the
    /// teams as they stood at the start.
    pub fn is_decided(
        &self,
        survivors: &[PlayerId],
        participants: &[PlayerId],
        teams: &HashMap<PlayerId, String>,
    ) -> bool {
        if survivors.is_empty() {
            return true;
        }
        match self {
            GameMode::FreeForAll => survivors.len() == 1 && participants.len() > 1,
            GameMode::Teams(_) => {
                let surviving: IndexSet<&String> =
                    survivors.iter().filter_map(|id| teams.get(id)).collect();
                let playing: IndexSet<&String> =
                    participants.iter().filter_map(|id| teams.get(id)).collect();
                surviving.len() <= 1 && playing.len() > 1
            }
        }
    }
}
