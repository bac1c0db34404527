//! Rule table loading and validation
//!
//! Reads `[[row]]` tables from TOML files, decodes each row into a typed
//! [`TriggerRule`] and groups accepted rules into a [`RuleStore`]. Rows that
//! fail validation are reported as [`RuleDiagnostic`]s and never reach the
//! evaluator.

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use smartscript_types::{EntityLink, EventFlags, PhaseGate, PhaseMask, Position, SourceType};

use super::action::Action;
use super::error::{DiagnosticLevel, DslError, RuleDiagnostic, RuleError};
use super::event::Event;
use super::row::{PhaseColumn, RuleRow, RuleTable};
use super::rule::{ActionStep, EventSpec, RuleId, TriggerRule};
use super::store::{RuleSet, RuleStore};
use super::target::TargetDescriptor;

/// Result of loading one or more rule tables
#[derive(Debug, Default)]
pub struct LoadReport {
    pub store: RuleStore,
    pub diagnostics: Vec<RuleDiagnostic>,
    /// Number of files parsed successfully
    pub files: usize,
    /// Files that could not be read or parsed at all
    pub failed_files: Vec<DslError>,
}

impl LoadReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// File I/O
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a rule table from TOML text; `origin` names it in errors.
pub fn parse_table(content: &str, origin: &Path) -> Result<RuleTable, DslError> {
    toml::from_str(content).map_err(|source| DslError::ParseToml {
        path: origin.to_path_buf(),
        source,
    })
}

/// Read and parse a single rule table file
pub fn read_table(path: &Path) -> Result<RuleTable, DslError> {
    let content = fs::read_to_string(path).map_err(|source| DslError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&content, path)
}

/// Load rules from TOML text
pub fn load_rules_from_str(content: &str, origin: &Path) -> Result<LoadReport, DslError> {
    let table = parse_table(content, origin)?;
    Ok(report_from_tables(vec![(origin.to_path_buf(), table)], Vec::new()))
}

/// Load rules from a single TOML file
pub fn load_rules_from_file(path: &Path) -> Result<LoadReport, DslError> {
    let table = read_table(path)?;
    Ok(report_from_tables(vec![(path.to_path_buf(), table)], Vec::new()))
}

/// Load every `*.toml` rule table below `dir` (recursive).
///
/// Files are parsed in parallel and merged in path order. A file that fails
/// to parse is recorded in [`LoadReport::failed_files`] and skipped.
pub fn load_rules_from_dir(dir: &Path) -> Result<LoadReport, DslError> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "rules directory does not exist");
        return Ok(LoadReport::default());
    }

    let mut paths = Vec::new();
    collect_rule_files(dir, &mut paths)?;
    paths.sort();

    let parsed: Vec<Result<(PathBuf, RuleTable), DslError>> = paths
        .par_iter()
        .map(|path| read_table(path).map(|table| (path.clone(), table)))
        .collect();

    let mut tables = Vec::with_capacity(parsed.len());
    let mut failed = Vec::new();
    for result in parsed {
        match result {
            Ok(table) => tables.push(table),
            Err(e) => {
                tracing::warn!(error = %e, "skipping rule file");
                failed.push(e);
            }
        }
    }

    Ok(report_from_tables(tables, failed))
}

fn collect_rule_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DslError> {
    let entries = fs::read_dir(dir).map_err(|source| DslError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rule_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            out.push(path);
        }
    }
    Ok(())
}

fn report_from_tables(tables: Vec<(PathBuf, RuleTable)>, failed_files: Vec<DslError>) -> LoadReport {
    let files = tables.len();
    let (store, diagnostics) = build_store(&tables);

    for diag in &diagnostics {
        match diag.level {
            DiagnosticLevel::Error => tracing::warn!("{diag}"),
            DiagnosticLevel::Warning => tracing::debug!("{diag}"),
        }
    }
    tracing::info!(
        files,
        links = store.len(),
        rules = store.rule_count(),
        rejected = diagnostics.iter().filter(|d| d.is_error()).count(),
        "rule tables loaded"
    );

    LoadReport {
        store,
        diagnostics,
        files,
        failed_files,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct RowOrigin {
    file: PathBuf,
    row: usize,
}

struct Pending {
    rule: TriggerRule,
    origin: RowOrigin,
    rejected: bool,
}

struct LastHead {
    key: (i64, u32, u32),
    /// Index into `pending`, `None` if the head row was rejected
    pending: Option<usize>,
}

struct Diagnostics(Vec<RuleDiagnostic>);

impl Diagnostics {
    fn push(&mut self, row: &RuleRow, origin: &RowOrigin, level: DiagnosticLevel, error: RuleError) {
        self.0.push(RuleDiagnostic {
            entry: row.entry,
            source_type: row.source_type,
            rule_id: row.id,
            file: origin.file.clone(),
            row: origin.row,
            level,
            error,
        });
    }

    fn push_for_rule(&mut self, rule: &TriggerRule, origin: &RowOrigin, error: RuleError) {
        self.0.push(RuleDiagnostic {
            entry: rule.link.entry,
            source_type: rule.link.source_type.id(),
            rule_id: rule.id,
            file: origin.file.clone(),
            row: origin.row,
            level: DiagnosticLevel::Warning,
            error,
        });
    }
}

/// Validate rows from several tables and group the accepted rules by link.
///
/// Tables are processed in the given order; within a table rows keep their
/// declaration order. Continuation rows never span files.
pub fn build_store(tables: &[(PathBuf, RuleTable)]) -> (RuleStore, Vec<RuleDiagnostic>) {
    let mut diags = Diagnostics(Vec::new());
    let mut pending: Vec<Pending> = Vec::new();

    for (file, table) in tables {
        let mut last: Option<LastHead> = None;

        for (index, row) in table.rows.iter().enumerate() {
            let origin = RowOrigin {
                file: file.clone(),
                row: index,
            };
            let key = (row.entry, row.source_type, row.id);

            if row.is_continuation() {
                match &last {
                    Some(head) if head.key == key => {
                        // Parent already reported when rejected
                        let Some(idx) = head.pending else { continue };
                        match decode_continuation(row) {
                            Ok(step) => {
                                if let Some(warning) = untargeted_warning(&step, &pending[idx].rule.target) {
                                    diags.push(row, &origin, DiagnosticLevel::Warning, warning);
                                }
                                pending[idx].rule.actions.push(step);
                            }
                            Err(e) => {
                                diags.push(row, &origin, DiagnosticLevel::Error, e);
                                pending[idx].rejected = true;
                            }
                        }
                    }
                    _ => diags.push(row, &origin, DiagnosticLevel::Error, RuleError::OrphanContinuation),
                }
                continue;
            }

            match decode_rule(row) {
                Ok((rule, warnings)) => {
                    for warning in warnings {
                        diags.push(row, &origin, DiagnosticLevel::Warning, warning);
                    }
                    pending.push(Pending {
                        rule,
                        origin,
                        rejected: false,
                    });
                    last = Some(LastHead {
                        key,
                        pending: Some(pending.len() - 1),
                    });
                }
                Err(e) => {
                    diags.push(row, &origin, DiagnosticLevel::Error, e);
                    last = Some(LastHead { key, pending: None });
                }
            }
        }
    }

    // Group by link, rejecting duplicate ids (first declaration wins)
    let mut grouped: HashMap<EntityLink, Vec<TriggerRule>> = HashMap::new();
    let mut order: Vec<EntityLink> = Vec::new();
    let mut origins: HashMap<(EntityLink, RuleId), RowOrigin> = HashMap::new();
    let mut seen: HashSet<(EntityLink, RuleId)> = HashSet::new();

    for p in pending.into_iter().filter(|p| !p.rejected) {
        let key = (p.rule.link, p.rule.id);
        if !seen.insert(key) {
            diags.0.push(RuleDiagnostic {
                entry: p.rule.link.entry,
                source_type: p.rule.link.source_type.id(),
                rule_id: p.rule.id,
                file: p.origin.file.clone(),
                row: p.origin.row,
                level: DiagnosticLevel::Error,
                error: RuleError::DuplicateRuleId,
            });
            continue;
        }
        origins.insert(key, p.origin);
        if !grouped.contains_key(&p.rule.link) {
            order.push(p.rule.link);
        }
        grouped.entry(p.rule.link).or_default().push(p.rule);
    }

    let mut store = RuleStore::new();
    for link in order {
        let Some(mut rules) = grouped.remove(&link) else {
            continue;
        };
        check_links(&mut rules, &origins, &mut diags);
        store.insert(RuleSet::new(link, rules));
    }

    (store, diags.0)
}

/// Drop dangling links and flag link cycles within one rule set
fn check_links(
    rules: &mut [TriggerRule],
    origins: &HashMap<(EntityLink, RuleId), RowOrigin>,
    diags: &mut Diagnostics,
) {
    let ids: HashSet<RuleId> = rules.iter().map(|r| r.id).collect();

    for rule in rules.iter_mut() {
        if let Some(target) = rule.link_to
            && !ids.contains(&target)
        {
            if let Some(origin) = origins.get(&(rule.link, rule.id)) {
                diags.push_for_rule(rule, origin, RuleError::MissingLinkTarget(target));
            }
            rule.link_to = None;
        }
    }

    let next: HashMap<RuleId, RuleId> = rules
        .iter()
        .filter_map(|r| r.link_to.map(|to| (r.id, to)))
        .collect();

    for rule in rules.iter() {
        let mut visited = HashSet::new();
        let mut current = rule.id;
        visited.insert(current);
        while let Some(&to) = next.get(&current) {
            if to == rule.id {
                if let Some(origin) = origins.get(&(rule.link, rule.id)) {
                    diags.push_for_rule(rule, origin, RuleError::LinkCycle(current));
                }
                break;
            }
            if !visited.insert(to) {
                // Cycle elsewhere in the chain; reported on its own members
                break;
            }
            current = to;
        }
    }
}

fn decode_phase(column: &Option<PhaseColumn>) -> Result<PhaseGate, RuleError> {
    match column {
        None => Ok(PhaseGate::Always),
        Some(PhaseColumn::Keyword(word)) if word.eq_ignore_ascii_case("always") => Ok(PhaseGate::Always),
        Some(PhaseColumn::Keyword(word)) => Err(RuleError::InvalidPhaseKeyword(word.clone())),
        Some(PhaseColumn::Mask(0)) => Err(RuleError::ZeroPhaseMask),
        Some(PhaseColumn::Mask(raw)) => u32::try_from(*raw)
            .ok()
            .and_then(PhaseMask::from_bits)
            .map(PhaseGate::Phases)
            .ok_or(RuleError::PhaseMaskOutOfRange(*raw)),
    }
}

fn decode_target(kind: u32, params: [u32; 4], row: &RuleRow) -> Result<TargetDescriptor, RuleError> {
    let literal = Position::new(row.target_x, row.target_y, row.target_z, row.target_o);
    TargetDescriptor::from_params(kind, params, literal)
}

fn untargeted_warning(step: &ActionStep, shared: &TargetDescriptor) -> Option<RuleError> {
    let target = step.target.as_ref().unwrap_or(shared);
    (step.action.needs_targets() && target.is_none())
        .then(|| RuleError::NoTargetForTargetedAction(step.action.name()))
}

/// Decode a rule head row. Returns the rule plus any warnings.
fn decode_rule(row: &RuleRow) -> Result<(TriggerRule, Vec<RuleError>), RuleError> {
    let source_type = SourceType::from_id(row.source_type).ok_or(RuleError::UnknownSourceType(row.source_type))?;
    let kind = row.event_kind.ok_or(RuleError::OrphanContinuation)?;
    let event = Event::from_params(kind, row.event_params())?;

    let phase = decode_phase(&row.event_phase_mask)?;

    let raw_flags = row.event_flags.unwrap_or(0);
    let flags = EventFlags::from_bits(raw_flags).ok_or(RuleError::UnknownEventFlags(raw_flags))?;

    let chance = row.event_chance.unwrap_or(100);
    if chance > 100 {
        return Err(RuleError::ChanceOutOfRange(chance));
    }

    let cooldown_min = row.cooldown_min.unwrap_or(0);
    let cooldown_max = row.cooldown_max.unwrap_or(cooldown_min);
    if cooldown_min > cooldown_max {
        return Err(RuleError::CooldownInverted {
            min: cooldown_min,
            max: cooldown_max,
        });
    }

    if source_type == SourceType::TimedActionList {
        if !event.is_update() {
            return Err(RuleError::TimedListStepNotUpdate(event.name()));
        }
    } else if !event.scope().contains(source_type.mask()) {
        return Err(RuleError::EventNotValidForSource {
            event: event.name(),
            source_type,
        });
    }

    let action = Action::from_params(row.action_kind, row.action_params())?;
    let target = decode_target(row.target_kind, row.target_params(), row)?;

    let mut warnings = Vec::new();
    if flags.contains(EventFlags::DEBUG_ONLY) {
        warnings.push(RuleError::DebugOnlyRule);
    }

    let step = ActionStep { action, target: None };
    if let Some(warning) = untargeted_warning(&step, &target) {
        warnings.push(warning);
    }

    let rule = TriggerRule {
        link: EntityLink::new(row.entry, source_type),
        id: row.id,
        event: EventSpec {
            event,
            phase,
            flags,
            chance: chance as u8,
            cooldown_min,
            cooldown_max,
        },
        actions: vec![step],
        target,
        link_to: row.link_to.filter(|&to| to != 0),
        comment: row.comment.clone(),
    };
    Ok((rule, warnings))
}

/// Decode a continuation row into an extra action step
fn decode_continuation(row: &RuleRow) -> Result<ActionStep, RuleError> {
    if let Some(column) = row.first_event_column_set() {
        return Err(RuleError::ContinuationSetsEventField(column));
    }
    let action = Action::from_params(row.action_kind, row.action_params())?;
    let target = if row.target_kind == 0 {
        None
    } else {
        Some(decode_target(row.target_kind, row.target_params(), row)?)
    };
    Ok(ActionStep { action, target })
}
