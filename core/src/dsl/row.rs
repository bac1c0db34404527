//! Raw rule table rows as they appear in TOML files.
//!
//! A rule table is a list of `[[row]]` entries. Rows are deliberately flat and
//! numeric so tables can be exported from any tabular source; typed decoding
//! happens in [`crate::dsl::loader`].

use serde::{Deserialize, Serialize};

/// One rule table file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default, rename = "row")]
    pub rows: Vec<RuleRow>,
}

/// `event_phase_mask` column: the keyword `"always"` or an integer mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseColumn {
    Mask(i64),
    Keyword(String),
}

/// A single rule row.
///
/// Columns left out take their defaults. A row without `event_kind` is a
/// continuation of the rule declared just before it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleRow {
    pub entry: i64,
    #[serde(default)]
    pub source_type: u32,
    pub id: u32,
    #[serde(default)]
    pub link_to: Option<u32>,

    // ─── Event ─────────────────────────────────────────────────────────────
    #[serde(default)]
    pub event_kind: Option<u32>,
    #[serde(default)]
    pub event_param1: u32,
    #[serde(default)]
    pub event_param2: u32,
    #[serde(default)]
    pub event_param3: u32,
    #[serde(default)]
    pub event_param4: u32,
    #[serde(default)]
    pub event_phase_mask: Option<PhaseColumn>,
    #[serde(default)]
    pub event_flags: Option<u32>,
    #[serde(default)]
    pub event_chance: Option<u32>,
    #[serde(default)]
    pub cooldown_min: Option<u32>,
    #[serde(default)]
    pub cooldown_max: Option<u32>,

    // ─── Action ────────────────────────────────────────────────────────────
    #[serde(default)]
    pub action_kind: u32,
    #[serde(default)]
    pub action_param1: u32,
    #[serde(default)]
    pub action_param2: u32,
    #[serde(default)]
    pub action_param3: u32,
    #[serde(default)]
    pub action_param4: u32,
    #[serde(default)]
    pub action_param5: u32,
    #[serde(default)]
    pub action_param6: u32,

    // ─── Target ────────────────────────────────────────────────────────────
    #[serde(default)]
    pub target_kind: u32,
    #[serde(default)]
    pub target_param1: u32,
    #[serde(default)]
    pub target_param2: u32,
    #[serde(default)]
    pub target_param3: u32,
    #[serde(default)]
    pub target_param4: u32,
    #[serde(default)]
    pub target_x: f32,
    #[serde(default)]
    pub target_y: f32,
    #[serde(default)]
    pub target_z: f32,
    #[serde(default)]
    pub target_o: f32,

    #[serde(default)]
    pub comment: String,
}

impl RuleRow {
    pub fn is_continuation(&self) -> bool {
        self.event_kind.is_none()
    }

    pub fn event_params(&self) -> [u32; 4] {
        [
            self.event_param1,
            self.event_param2,
            self.event_param3,
            self.event_param4,
        ]
    }

    pub fn action_params(&self) -> [u32; 6] {
        [
            self.action_param1,
            self.action_param2,
            self.action_param3,
            self.action_param4,
            self.action_param5,
            self.action_param6,
        ]
    }

    pub fn target_params(&self) -> [u32; 4] {
        [
            self.target_param1,
            self.target_param2,
            self.target_param3,
            self.target_param4,
        ]
    }

    /// Name of the first event-level column a continuation row must leave empty
    pub fn first_event_column_set(&self) -> Option<&'static str> {
        if self.link_to.is_some_and(|l| l != 0) {
            Some("link_to")
        } else if self.event_phase_mask.is_some() {
            Some("event_phase_mask")
        } else if self.event_flags.is_some() {
            Some("event_flags")
        } else if self.event_chance.is_some() {
            Some("event_chance")
        } else if self.cooldown_min.is_some() || self.cooldown_max.is_some() {
            Some("cooldown")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_rows() {
        let table: RuleTable = toml::from_str(
            r#"
            [[row]]
            entry = 100
            id = 0
            event_kind = 4
            event_phase_mask = "always"
            action_kind = 11
            action_param1 = 1234

            [[row]]
            entry = 100
            id = 0
            action_kind = 22
            action_param1 = 2
            "#,
        )
        .unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].event_kind, Some(4));
        assert_eq!(
            table.rows[0].event_phase_mask,
            Some(PhaseColumn::Keyword("always".into()))
        );
        assert!(table.rows[1].is_continuation());
        assert_eq!(table.rows[1].first_event_column_set(), None);
    }

    #[test]
    fn integer_phase_mask() {
        let table: RuleTable = toml::from_str(
            r#"
            [[row]]
            entry = 1
            id = 3
            event_kind = 0
            event_phase_mask = 6
            "#,
        )
        .unwrap();
        assert_eq!(table.rows[0].event_phase_mask, Some(PhaseColumn::Mask(6)));
    }
}
