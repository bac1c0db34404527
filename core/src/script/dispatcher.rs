//! Action dispatch: runs a fired rule's steps against the world.
//!
//! Steps run strictly in order. Targeted actions emit one [`Command`] per
//! resolved entity; script-state actions (phase, counters, timed events,
//! timed lists, reset) are staged on the owner's [`RuntimeState`] and take
//! effect when the evaluation pass commits.

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use smartscript_types::{CastFlags, EntityHandle, MAX_PHASE, PhaseMask, Position};
use tracing::debug;

use super::state::{CounterOp, RuntimeState, TimedEvent, TimedEventOp, TimedListRequest};
use super::targets::{TargetContext, TargetSet, resolve};
use super::world::{Command, WaypointOp, World};
use crate::dsl::{Action, ActionStep, CombatGate, PowerOp, TargetDescriptor, TriggerRule};

fn roll(rng: &mut StdRng, min: u32, max: u32) -> u32 {
    if min >= max { min } else { rng.gen_range(min..=max) }
}

pub struct Dispatcher<'a> {
    pub world: &'a mut dyn World,
    pub state: &'a mut RuntimeState,
    pub rng: &'a mut StdRng,
    pub ctx: TargetContext,
    /// Commands accepted by the world during this dispatch
    pub performed: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        world: &'a mut dyn World,
        state: &'a mut RuntimeState,
        rng: &'a mut StdRng,
        ctx: TargetContext,
    ) -> Self {
        Self {
            world,
            state,
            rng,
            ctx,
            performed: 0,
        }
    }

    /// Resolve the rule's shared target once and run every step.
    pub fn execute(&mut self, rule: &TriggerRule) {
        let shared = self.resolve(&rule.target);
        for step in &rule.actions {
            self.run_step(step, rule, &shared);
        }
    }

    fn resolve(&mut self, desc: &TargetDescriptor) -> TargetSet {
        resolve(desc, &self.ctx, &*self.world, &self.state.stored_targets, &mut *self.rng)
    }

    fn run_step(&mut self, step: &ActionStep, rule: &TriggerRule, shared: &TargetSet) {
        let (targets, literal) = match &step.target {
            Some(desc) => (self.resolve(desc), desc.literal),
            None => (shared.clone(), rule.target.literal),
        };
        if step.action.needs_targets() && targets.is_empty() {
            debug!(rule = %rule.label(), action = step.action.name(), "no targets; skipped");
            return;
        }
        self.dispatch(&step.action, &targets, literal);
    }

    fn perform(&mut self, command: Command) {
        let name = command.name();
        match self.world.perform(command) {
            Ok(()) => {
                self.performed += 1;
                debug!(owner = %self.ctx.owner, command = name, "performed");
            }
            Err(e) => debug!(owner = %self.ctx.owner, command = name, error = %e, "command failed"),
        }
    }

    fn owner_position(&self) -> Position {
        self.world
            .entity(self.ctx.owner)
            .map(|e| e.position)
            .unwrap_or_default()
    }

    /// Where to place summons: the target position, every target entity's
    /// position, or the owner's position as a last resort.
    fn spawn_positions(&self, targets: &TargetSet) -> Vec<Position> {
        if let Some(position) = targets.position {
            return vec![position];
        }
        let positions: Vec<Position> = targets
            .entities
            .iter()
            .filter_map(|h| self.world.entity(*h))
            .map(|e| e.position)
            .collect();
        if positions.is_empty() {
            vec![self.owner_position()]
        } else {
            positions
        }
    }

    /// Destination of a movement action
    fn destination(&self, targets: &TargetSet) -> Option<Position> {
        targets.position.or_else(|| {
            targets
                .entities
                .first()
                .and_then(|h| self.world.entity(*h))
                .map(|e| e.position)
        })
    }

    fn cast(&mut self, caster: EntityHandle, target: EntityHandle, spell: u32, flags: CastFlags) {
        if flags.contains(CastFlags::AURA_NOT_PRESENT) && self.world.aura_stacks(target, spell) > 0 {
            return;
        }
        if flags.contains(CastFlags::INTERRUPT_PREVIOUS) && self.world.casting_spell(caster).is_some() {
            self.perform(Command::InterruptCast {
                actor: caster,
                spell: None,
                with_delayed: false,
            });
        }
        self.perform(Command::CastSpell {
            caster,
            target,
            spell,
            triggered: flags.contains(CastFlags::TRIGGERED),
            combat_move: flags.contains(CastFlags::COMBAT_MOVE),
        });
    }

    fn stage_phase(&mut self, phase: PhaseMask) {
        self.state.staged.phase = Some(phase);
    }

    fn stage_timed_list(&mut self, list_id: u32, mode: CombatGate, allow_override: bool) {
        self.state.staged.timed_lists.push(TimedListRequest {
            list_id,
            mode,
            allow_override,
            invoker: self.ctx.invoker,
        });
    }

    fn dispatch(&mut self, action: &Action, targets: &TargetSet, literal: Position) {
        let owner = self.ctx.owner;
        let entities = targets.entities.clone();

        match action {
            Action::None => {}

            // ─── Speech & presentation ─────────────────────────────────────
            Action::Talk { group, duration, use_talk_target } => {
                if *use_talk_target {
                    for t in entities {
                        self.perform(Command::Talk {
                            speaker: t,
                            listener: self.ctx.invoker,
                            group: *group,
                            duration_ms: *duration,
                        });
                    }
                } else {
                    let listener = entities.first().copied().or(self.ctx.invoker);
                    self.perform(Command::Talk {
                        speaker: owner,
                        listener,
                        group: *group,
                        duration_ms: *duration,
                    });
                }
            }
            Action::SimpleTalk { group } => {
                for t in entities {
                    self.perform(Command::Talk {
                        speaker: t,
                        listener: self.ctx.invoker,
                        group: *group,
                        duration_ms: 0,
                    });
                }
            }
            Action::Sound { sound, only_self } => {
                for t in entities {
                    self.perform(Command::PlaySound {
                        source: t,
                        listener: only_self.then_some(t),
                        sound: *sound,
                    });
                }
            }
            Action::PlayEmote { emote } => {
                for t in entities {
                    self.perform(Command::PlayEmote { actor: t, emote: *emote });
                }
            }
            Action::RandomEmote { emotes } => {
                for t in entities {
                    if let Some(emote) = emotes.choose(&mut *self.rng).copied() {
                        self.perform(Command::PlayEmote { actor: t, emote });
                    }
                }
            }
            Action::SetEmoteState { emote } => {
                for t in entities {
                    self.perform(Command::SetEmoteState { actor: t, emote: *emote });
                }
            }
            Action::MorphToEntryOrModel { entry, model } => {
                for t in entities {
                    self.perform(Command::Morph { target: t, entry: *entry, model: *model });
                }
            }
            Action::SetVisibility { visible } => {
                for t in entities {
                    self.perform(Command::SetVisibility { target: t, visible: *visible });
                }
            }
            Action::ScenePlay { scene } => {
                for t in self.players(&entities) {
                    self.perform(Command::PlayScene { player: t, scene: *scene });
                }
            }
            Action::SceneCancel { scene } => {
                for t in self.players(&entities) {
                    self.perform(Command::CancelScene { player: t, scene: *scene });
                }
            }

            // ─── Spells & auras ────────────────────────────────────────────
            Action::Cast { spell, flags } => {
                for t in entities {
                    self.cast(owner, t, *spell, *flags);
                }
            }
            Action::SelfCast { spell, flags } => {
                for t in entities {
                    self.cast(t, t, *spell, *flags);
                }
            }
            Action::CrossCast { spell, flags, casters } => {
                let casters = self.resolve(casters);
                for caster in casters.entities {
                    for t in &entities {
                        self.cast(caster, *t, *spell, *flags);
                    }
                }
            }
            Action::AddAura { spell } => {
                for t in entities {
                    self.perform(Command::AddAura { target: t, spell: *spell });
                }
            }
            Action::RemoveAurasFromSpell { spell } => {
                for t in entities {
                    self.perform(Command::RemoveAura {
                        target: t,
                        spell: (*spell != 0).then_some(*spell),
                    });
                }
            }
            Action::InterruptSpell { spell, with_delayed } => {
                for t in entities {
                    self.perform(Command::InterruptCast {
                        actor: t,
                        spell: (*spell != 0).then_some(*spell),
                        with_delayed: *with_delayed,
                    });
                }
            }

            // ─── Combat ────────────────────────────────────────────────────
            Action::SetFaction { faction } => {
                for t in entities {
                    self.perform(Command::SetFaction { target: t, faction: *faction });
                }
            }
            Action::SetReactState { state } => {
                for t in entities {
                    self.perform(Command::SetReactState { target: t, state: *state });
                }
            }
            Action::ThreatSinglePct { inc, dec } => {
                let pct = *inc as i32 - *dec as i32;
                for t in entities {
                    self.perform(Command::ModifyThreat { actor: owner, target: t, pct });
                }
            }
            Action::ThreatAllPct { inc, dec } => {
                let pct = *inc as i32 - *dec as i32;
                for entry in self.world.threat_list(owner) {
                    self.perform(Command::ModifyThreat { actor: owner, target: entry.handle, pct });
                }
            }
            Action::AutoAttack { enabled } => {
                self.perform(Command::SetAutoAttack { actor: owner, enabled: *enabled });
            }
            Action::AllowCombatMovement { enabled } => {
                self.perform(Command::SetCombatMovement { actor: owner, enabled: *enabled });
            }
            Action::AttackStart => {
                if let Some(t) = entities.first() {
                    self.perform(Command::AttackStart { actor: owner, target: *t });
                }
            }
            Action::AttackStop => self.perform(Command::AttackStop { actor: owner }),
            Action::Evade => self.perform(Command::Evade { actor: owner }),
            Action::FleeForAssist { with_emote } => {
                self.perform(Command::FleeForAssist { actor: owner, with_emote: *with_emote });
            }
            Action::CombatStop => self.perform(Command::CombatStop { actor: owner }),
            Action::CallForHelp { radius, with_emote } => {
                self.perform(Command::CallForHelp {
                    actor: owner,
                    radius: *radius,
                    with_emote: *with_emote,
                });
            }
            Action::SetInCombatWithZone => self.perform(Command::SetInCombatWithZone { actor: owner }),
            Action::SetInvincibilityHpLevel { flat, percent } => {
                self.perform(Command::SetInvincibility {
                    actor: owner,
                    flat: *flat,
                    percent: *percent,
                });
            }
            Action::Die => self.perform(Command::Kill { target: owner }),
            Action::KillUnit => {
                for t in entities {
                    self.perform(Command::Kill { target: t });
                }
            }
            Action::ForceDespawn { delay_ms } => {
                for t in entities {
                    self.perform(Command::Despawn { target: t, delay_ms: *delay_ms });
                }
            }

            // ─── Summons & objects ─────────────────────────────────────────
            Action::SummonCreature { entry, summon_type, duration_ms, attack_invoker } => {
                let attack = if *attack_invoker { self.ctx.invoker } else { None };
                for position in self.spawn_positions(targets) {
                    self.perform(Command::SummonCreature {
                        summoner: owner,
                        entry: *entry,
                        position,
                        summon_type: *summon_type,
                        duration_ms: *duration_ms,
                        attack,
                    });
                }
            }
            Action::SummonGameObject { entry, despawn_secs } => {
                for position in self.spawn_positions(targets) {
                    self.perform(Command::SummonGameObject {
                        summoner: owner,
                        entry: *entry,
                        position,
                        despawn_secs: *despawn_secs,
                    });
                }
            }
            Action::ActivateGameObject => {
                for t in entities {
                    self.perform(Command::ActivateGameObject { target: t, invoker: self.ctx.invoker });
                }
            }

            // ─── Movement ──────────────────────────────────────────────────
            Action::Follow { distance, angle, end_entry } => {
                if let Some(t) = entities.first() {
                    self.perform(Command::Follow {
                        actor: owner,
                        target: *t,
                        distance: *distance,
                        angle: *angle,
                        end_entry: *end_entry,
                    });
                }
            }
            Action::WaypointStart { run, path, repeat } => self.perform(Command::Waypoint {
                actor: owner,
                op: WaypointOp::Start { path: *path, run: *run, repeat: *repeat },
            }),
            Action::WaypointPause { delay_ms } => self.perform(Command::Waypoint {
                actor: owner,
                op: WaypointOp::Pause { delay_ms: *delay_ms },
            }),
            Action::WaypointStop { despawn_ms } => self.perform(Command::Waypoint {
                actor: owner,
                op: WaypointOp::Stop { despawn_ms: *despawn_ms },
            }),
            Action::WaypointResume => self.perform(Command::Waypoint {
                actor: owner,
                op: WaypointOp::Resume,
            }),
            Action::SetRun { run } => self.perform(Command::SetRun { actor: owner, run: *run }),
            Action::Teleport { map } => {
                let position = targets.position.unwrap_or(literal);
                for t in entities {
                    self.perform(Command::Teleport { target: t, map: *map, position });
                }
            }
            Action::MoveToPosition { point_id } => {
                if let Some(position) = self.destination(targets) {
                    self.perform(Command::MoveTo { actor: owner, point_id: *point_id, position });
                }
            }
            Action::JumpToPosition { speed_xy, speed_z } => {
                if let Some(position) = self.destination(targets) {
                    self.perform(Command::JumpTo {
                        actor: owner,
                        position,
                        speed_xy: *speed_xy,
                        speed_z: *speed_z,
                    });
                }
            }
            Action::RandomMove { radius } => {
                self.perform(Command::RandomMove { actor: owner, radius: *radius });
            }
            Action::SetOrientation => {
                let orientation = match (targets.position, entities.first()) {
                    (Some(position), _) => Some(position.o),
                    (None, Some(t)) => self
                        .world
                        .entity(*t)
                        .map(|e| self.owner_position().angle_to(&e.position)),
                    (None, None) => None,
                };
                if let Some(orientation) = orientation {
                    self.perform(Command::SetOrientation { actor: owner, orientation });
                }
            }
            Action::SetHomePosition => {
                let position = targets.position.unwrap_or_else(|| self.owner_position());
                self.perform(Command::SetHomePosition { actor: owner, position });
            }
            Action::SetRoot { rooted } => {
                for t in entities {
                    self.perform(Command::SetRoot { target: t, rooted: *rooted });
                }
            }

            // ─── Quests & data ─────────────────────────────────────────────
            Action::FailQuest { quest } => {
                for t in self.players(&entities) {
                    self.perform(Command::FailQuest { player: t, quest: *quest });
                }
            }
            Action::OfferQuest { quest, direct_add } => {
                for t in self.players(&entities) {
                    self.perform(Command::OfferQuest {
                        player: t,
                        quest: *quest,
                        direct_add: *direct_add,
                    });
                }
            }
            Action::CallKilledMonster { entry } => {
                for t in self.players(&entities) {
                    self.perform(Command::KilledMonster { player: t, entry: *entry });
                }
            }
            Action::SetInstanceData { field, value } => {
                self.perform(Command::SetInstanceData {
                    actor: owner,
                    field: *field,
                    value: *value,
                });
            }
            Action::SetData { field, value } => {
                for t in entities {
                    self.perform(Command::SetData {
                        target: t,
                        field: *field,
                        value: *value,
                        invoker: owner,
                    });
                }
            }
            Action::SetActive { active } => {
                for t in entities {
                    self.perform(Command::SetActive { target: t, active: *active });
                }
            }
            Action::SetPower { power_type, value } => self.power(&entities, *power_type, PowerOp::Set, *value),
            Action::AddPower { power_type, value } => self.power(&entities, *power_type, PowerOp::Add, *value),
            Action::RemovePower { power_type, value } => {
                self.power(&entities, *power_type, PowerOp::Remove, *value)
            }

            // ─── Script state ──────────────────────────────────────────────
            Action::SetEventPhase { phase } => self.stage_phase(PhaseMask::single(*phase)),
            Action::IncEventPhase { inc, dec } => {
                let current = self.state.pending_phase().current_phase() as i32;
                let next = (current + *inc as i32 - *dec as i32).clamp(0, MAX_PHASE as i32);
                self.stage_phase(PhaseMask::single(next as u8));
            }
            Action::RandomPhase { phases } => {
                if let Some(phase) = phases.choose(&mut *self.rng).copied() {
                    self.stage_phase(PhaseMask::single(phase));
                }
            }
            Action::RandomPhaseRange { min, max } => {
                let phase = roll(&mut *self.rng, *min as u32, *max as u32) as u8;
                self.stage_phase(PhaseMask::single(phase));
            }
            Action::SetCounter { counter, value, reset } => {
                self.state.staged.counters.push(CounterOp {
                    counter: *counter,
                    value: *value,
                    reset: *reset,
                });
            }
            Action::StoreTargetList { var_id } => {
                self.state.stored_targets.insert(*var_id, entities);
            }
            Action::CreateTimedEvent {
                id,
                initial_min,
                initial_max,
                repeat_min,
                repeat_max,
                chance,
            } => {
                let next_fire_at = roll(&mut *self.rng, *initial_min, *initial_max);
                let repeat = (*repeat_max != 0).then_some((*repeat_min, *repeat_max));
                self.state.staged.timed_events.push(TimedEventOp::Create(TimedEvent {
                    id: *id,
                    elapsed: 0,
                    next_fire_at,
                    repeat,
                    chance: *chance,
                }));
            }
            Action::TriggerTimedEvent { id } => {
                self.state.staged.timed_events.push(TimedEventOp::Trigger(*id));
            }
            Action::RemoveTimedEvent { id } => {
                self.state.staged.timed_events.push(TimedEventOp::Remove(*id));
            }
            Action::CallScriptReset => self.state.staged.reset_requested = true,
            Action::CallTimedActionList { list_id, mode, allow_override } => {
                self.stage_timed_list(*list_id, *mode, *allow_override);
            }
            Action::CallRandomTimedActionList { lists } => {
                if let Some(list_id) = lists.choose(&mut *self.rng).copied() {
                    self.stage_timed_list(list_id, CombatGate::Any, false);
                }
            }
            Action::CallRandomRangeTimedActionList { min, max } => {
                let list_id = roll(&mut *self.rng, *min, *max);
                self.stage_timed_list(list_id, CombatGate::Any, false);
            }
        }
    }

    fn players(&self, entities: &[EntityHandle]) -> Vec<EntityHandle> {
        entities
            .iter()
            .copied()
            .filter(|h| self.world.entity(*h).is_some_and(|e| e.is_player()))
            .collect()
    }

    fn power(&mut self, entities: &[EntityHandle], power_type: u32, op: PowerOp, amount: u32) {
        for t in entities {
            self.perform(Command::Power {
                target: *t,
                power_type,
                op,
                amount,
            });
        }
    }
}
