//! Tests for rule table loading and validation

use std::path::Path;

use smartscript_types::{EntityLink, EventFlags, PhaseGate, PhaseMask, SourceType};

use super::*;

fn load(content: &str) -> LoadReport {
    load_rules_from_str(content, Path::new("inline.toml")).expect("valid TOML")
}

fn errors(report: &LoadReport) -> Vec<RuleError> {
    report
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.error.clone())
        .collect()
}

fn warnings(report: &LoadReport) -> Vec<RuleError> {
    report
        .diagnostics
        .iter()
        .filter(|d| !d.is_error())
        .map(|d| d.error.clone())
        .collect()
}

#[test]
fn test_valid_rule_decodes() {
    let report = load(
        r#"
        [[row]]
        entry = 100
        id = 0
        event_kind = 2          # health_pct
        event_param1 = 0
        event_param2 = 50
        event_flags = 1         # not repeatable
        action_kind = 22        # set_event_phase
        action_param1 = 2
        target_kind = 1         # owner
        comment = "Phase two at half health"
        "#,
    );

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    let set = report.store.for_link(&EntityLink::creature(100)).unwrap();
    let rule = set.get(0).unwrap();
    assert_eq!(rule.event.event, Event::HealthPct { min: 0, max: 50 });
    assert_eq!(rule.event.phase, PhaseGate::Always);
    assert!(rule.flags().contains(EventFlags::NOT_REPEATABLE));
    assert_eq!(rule.event.chance, 100);
    assert_eq!(rule.actions.len(), 1);
    assert_eq!(rule.actions[0].action, Action::SetEventPhase { phase: 2 });
    assert_eq!(rule.target.target, Target::Owner);
    assert_eq!(rule.comment, "Phase two at half health");
}

#[test]
fn test_invalid_rows_rejected_with_diagnostics() {
    let report = load(
        r#"
        [[row]]
        entry = 1
        id = 0
        event_kind = 4
        event_phase_mask = 0
        action_kind = 11

        [[row]]
        entry = 1
        id = 1
        event_kind = 4
        cooldown_min = 5000
        cooldown_max = 1000

        [[row]]
        entry = 1
        id = 2
        event_kind = 500

        [[row]]
        entry = 1
        id = 3
        event_kind = 4
        event_phase_mask = 8192

        [[row]]
        entry = 1
        id = 4
        event_kind = 4
        event_chance = 150

        [[row]]
        entry = 1
        id = 5
        event_kind = 4
        event_flags = 0x40

        [[row]]
        entry = 1
        id = 6
        event_kind = 4
        action_kind = 999

        [[row]]
        entry = 1
        id = 7
        event_kind = 4
        target_kind = 27

        [[row]]
        entry = 1
        source_type = 4
        id = 8
        event_kind = 4
        "#,
    );

    assert_eq!(
        errors(&report),
        vec![
            RuleError::ZeroPhaseMask,
            RuleError::CooldownInverted { min: 5000, max: 1000 },
            RuleError::UnknownEventKind(500),
            RuleError::PhaseMaskOutOfRange(8192),
            RuleError::ChanceOutOfRange(150),
            RuleError::UnknownEventFlags(0x40),
            RuleError::UnknownActionKind(999),
            RuleError::UnknownTargetKind(27),
            RuleError::UnknownSourceType(4),
        ]
    );
    assert!(report.store.is_empty());

    let first = &report.diagnostics[0];
    assert_eq!(first.entry, 1);
    assert_eq!(first.rule_id, 0);
    assert_eq!(first.row, 0);
    assert_eq!(first.file, Path::new("inline.toml"));
    assert!(first.to_string().contains("rule 0"));
}

#[test]
fn test_phase_mask_forms() {
    let report = load(
        r#"
        [[row]]
        entry = 5
        id = 0
        event_kind = 4
        event_phase_mask = "always"

        [[row]]
        entry = 5
        id = 1
        event_kind = 4
        event_phase_mask = 6

        [[row]]
        entry = 5
        id = 2
        event_kind = 4
        event_phase_mask = "sometimes"
        "#,
    );

    let set = report.store.for_link(&EntityLink::creature(5)).unwrap();
    assert_eq!(set.get(0).unwrap().event.phase, PhaseGate::Always);
    assert_eq!(
        set.get(1).unwrap().event.phase,
        PhaseGate::Phases(PhaseMask::from_bits(6).unwrap())
    );
    assert!(set.get(2).is_none());
    assert_eq!(
        errors(&report),
        vec![RuleError::InvalidPhaseKeyword("sometimes".into())]
    );
}

#[test]
fn test_continuation_rows_append_actions() {
    let report = load(
        r#"
        [[row]]
        entry = 10
        id = 0
        event_kind = 4
        action_kind = 11
        action_param1 = 100
        target_kind = 2

        [[row]]
        entry = 10
        id = 0
        action_kind = 22
        action_param1 = 3

        [[row]]
        entry = 10
        id = 0
        action_kind = 75
        action_param1 = 200
        target_kind = 1
        "#,
    );

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    let set = report.store.for_link(&EntityLink::creature(10)).unwrap();
    let rule = set.get(0).unwrap();
    assert_eq!(rule.actions.len(), 3);
    assert_eq!(rule.actions[1].action, Action::SetEventPhase { phase: 3 });
    assert!(rule.actions[1].target.is_none());
    assert_eq!(
        rule.actions[2].target.as_ref().map(|t| &t.target),
        Some(&Target::Owner)
    );
}

#[test]
fn test_orphan_and_conflicting_continuations() {
    let report = load(
        r#"
        [[row]]
        entry = 10
        id = 0
        action_kind = 11

        [[row]]
        entry = 10
        id = 1
        event_kind = 4
        action_kind = 24

        [[row]]
        entry = 10
        id = 1
        cooldown_min = 100
        action_kind = 27
        "#,
    );

    assert_eq!(
        errors(&report),
        vec![
            RuleError::OrphanContinuation,
            RuleError::ContinuationSetsEventField("cooldown"),
        ]
    );
    // The head rule is rejected together with its bad continuation
    assert!(report.store.for_link(&EntityLink::creature(10)).is_none());
}

#[test]
fn test_duplicate_rule_ids_keep_first() {
    let report = load(
        r#"
        [[row]]
        entry = 3
        id = 0
        event_kind = 4
        action_kind = 24

        [[row]]
        entry = 3
        id = 1
        event_kind = 6
        action_kind = 24

        [[row]]
        entry = 3
        id = 0
        event_kind = 6
        action_kind = 27
        "#,
    );

    assert_eq!(errors(&report), vec![RuleError::DuplicateRuleId]);
    let set = report.store.for_link(&EntityLink::creature(3)).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(0).unwrap().event.event, Event::Aggro);
}

#[test]
fn test_event_scope_and_timed_list_steps() {
    let report = load(
        r#"
        [[row]]
        entry = 50
        source_type = 2       # area trigger
        id = 0
        event_kind = 4        # aggro: creatures only

        [[row]]
        entry = 7
        source_type = 9       # timed action list
        id = 0
        event_kind = 6        # death

        [[row]]
        entry = 7
        source_type = 9
        id = 1
        event_kind = 0
        event_param1 = 1000
        event_param2 = 1000
        action_kind = 11
        action_param1 = 5
        target_kind = 2
        "#,
    );

    assert_eq!(
        errors(&report),
        vec![
            RuleError::EventNotValidForSource {
                event: "aggro",
                source_type: SourceType::AreaTrigger,
            },
            RuleError::TimedListStepNotUpdate("death"),
        ]
    );
    let list = report.store.timed_list(7).unwrap();
    assert_eq!(list.len(), 1);
}

#[test]
fn test_link_warnings() {
    let report = load(
        r#"
        [[row]]
        entry = 20
        id = 0
        link_to = 9
        event_kind = 4
        action_kind = 24

        [[row]]
        entry = 20
        id = 1
        link_to = 2
        event_kind = 6
        action_kind = 24

        [[row]]
        entry = 20
        id = 2
        link_to = 1
        event_kind = 61
        action_kind = 24
        "#,
    );

    assert!(errors(&report).is_empty());
    let warnings = warnings(&report);
    assert!(warnings.contains(&RuleError::MissingLinkTarget(9)));
    assert!(warnings.contains(&RuleError::LinkCycle(2)));
    assert!(warnings.contains(&RuleError::LinkCycle(1)));

    let set = report.store.for_link(&EntityLink::creature(20)).unwrap();
    assert_eq!(set.get(0).unwrap().link_to, None);
    // Cyclic links stay; the evaluator's depth guard cuts them
    assert_eq!(set.get(1).unwrap().link_to, Some(2));
}

#[test]
fn test_untargeted_and_debug_warnings() {
    let report = load(
        r#"
        [[row]]
        entry = 30
        id = 0
        event_kind = 4
        event_flags = 0x80
        action_kind = 11
        action_param1 = 99
        "#,
    );

    assert_eq!(
        warnings(&report),
        vec![
            RuleError::DebugOnlyRule,
            RuleError::NoTargetForTargetedAction("cast"),
        ]
    );
    assert_eq!(report.store.rule_count(), 1);
}

#[test]
fn test_malformed_toml_is_an_error() {
    let result = load_rules_from_str("[[row]\nentry = ", Path::new("broken.toml"));
    assert!(matches!(result, Err(DslError::ParseToml { .. })));
}

#[test]
fn test_load_fixture_directory() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/rules");
    let report = load_rules_from_dir(&dir).unwrap();

    assert!(report.files >= 2);
    assert!(report.failed_files.is_empty());
    assert_eq!(report.error_count(), 0, "{:?}", report.diagnostics);

    let boss = report.store.for_link(&EntityLink::creature(36597)).unwrap();
    assert!(!boss.is_empty());
    assert!(report.store.timed_list(3659700).is_some());
}

#[test]
fn test_missing_directory_is_empty() {
    let report = load_rules_from_dir(Path::new("/definitely/not/here")).unwrap();
    assert!(report.store.is_empty());
    assert_eq!(report.files, 0);
}
