//! Game session - the turn loop that ties every system together
//!
//! A [`GameSession`] exclusively owns one participant's stats, quest and
//! achievement graphs, inventory, techniques, sect standing, farm and
//! event queue. It reads the
//! shared world and writes it only in the periodic refresh step. Each call
//! to [`GameSession::run_turn`] runs the same fixed sequence:
//!
//! 1. event queue must be empty
//! 2. world refresh (every `world_refresh_interval` turns)
//! 3. status projection
//! 4. story triggers and achievement re-check
//! 5. action dispatch
//! 6. time advance and crop growth
//! 7. event generation and resolution, quest completion
//! 8. invariant validation
//! 9. autosave (every `autosave_interval` turns)
//!
//! A rejected action stops after step 5 and costs no time. An invariant
//! violation aborts the session; it must be resumed from its last save.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ascension_logic::achievements::AchievementTracker;
use ascension_logic::constants::{flags, objectives, resources, skills, MAX_PROGRESS};
use ascension_logic::crafting::{self, CraftError, CraftOutcome, RefinableItem, RefineOutcome};
use ascension_logic::farming::{self, Farm, FarmError, HarvestOutcome};
use ascension_logic::graph::{DependencyGraph, GraphError};
use ascension_logic::progression::{self as rules, AdvanceOutcome};
use ascension_logic::sect::{self, JoinOutcome, SectError, SectStanding, TaskOutcome};
use ascension_logic::snapshot::{Snapshot, SNAPSHOT_VERSION};
use ascension_logic::stats::{Attribute, InvariantViolation, StatError, StatModel};
use ascension_logic::techniques::{PracticeOutcome, TechniqueBook, TechniqueError};
use ascension_logic::world::{Season, Weather, WorldState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::{ConfigError, SimConfig};
use crate::content::{Content, ContentError};
use crate::guide::{CompletionError, CompletionService, Guide, OfflineGuide};
use crate::persistence::{SaveError, SaveStore};
use crate::systems::*;

/// Question asked by the default consult menu entry.
pub const DEFAULT_QUESTION: &str = "What should I do next?";

// ── Actions ────────────────────────────────────────────────────────────

/// One discrete choice per turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Cultivate,
    Rest,
    Explore(String),
    Craft(String),
    /// Refine an owned artifact by id
    Refine(String),
    AcceptQuest(String),
    AbandonQuest(String),
    LearnTechnique(String),
    PracticeTechnique { id: String, hours: u32 },
    JoinSect(String),
    SectTask,
    /// Spend contribution on an exchange offer by id
    Exchange(String),
    Plant(String),
    /// Plot index, shown counting from 1
    Water(usize),
    Fertilize(usize),
    Harvest,
    ExpandFarm,
    Consult(String),
    Save,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Cultivate => write!(f, "cultivate"),
            Action::Rest => write!(f, "rest"),
            Action::Explore(location) => write!(f, "explore {}", location),
            Action::Craft(formula) => write!(f, "craft {}", formula),
            Action::Refine(item) => write!(f, "refine {}", item),
            Action::AcceptQuest(id) => write!(f, "accept {}", id),
            Action::AbandonQuest(id) => write!(f, "abandon {}", id),
            Action::LearnTechnique(id) => write!(f, "learn {}", id),
            Action::PracticeTechnique { id, hours } => write!(f, "practice {} {}", id, hours),
            Action::JoinSect(id) => write!(f, "join {}", id),
            Action::SectTask => write!(f, "task"),
            Action::Exchange(offer) => write!(f, "exchange {}", offer),
            Action::Plant(crop) => write!(f, "plant {}", crop),
            Action::Water(plot) => write!(f, "water {}", plot + 1),
            Action::Fertilize(plot) => write!(f, "fertilize {}", plot + 1),
            Action::Harvest => write!(f, "harvest"),
            Action::ExpandFarm => write!(f, "expand"),
            Action::Consult(question) => write!(f, "consult {}", question),
            Action::Save => write!(f, "save"),
            Action::Quit => write!(f, "quit"),
        }
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (verb, rest) = match input.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (input, ""),
        };
        let argument = |what: &str| {
            if rest.is_empty() {
                Err(ActionError::Malformed(format!("`{}` needs a {}", verb, what)))
            } else {
                Ok(rest.to_string())
            }
        };
        let plot = || match rest.parse::<usize>() {
            Ok(number) if number > 0 => Ok(number - 1),
            _ => Err(ActionError::Malformed(format!("bad plot number `{}`", rest))),
        };

        match verb.to_ascii_lowercase().as_str() {
            "cultivate" => Ok(Action::Cultivate),
            "rest" => Ok(Action::Rest),
            "explore" => Ok(Action::Explore(argument("location")?)),
            "craft" => Ok(Action::Craft(argument("formula")?)),
            "refine" => Ok(Action::Refine(argument("item")?)),
            "accept" => Ok(Action::AcceptQuest(argument("quest")?)),
            "abandon" => Ok(Action::AbandonQuest(argument("quest")?)),
            "learn" => Ok(Action::LearnTechnique(argument("technique")?)),
            "practice" => {
                let mut parts = rest.split_whitespace();
                let id = parts
                    .next()
                    .ok_or_else(|| ActionError::Malformed("`practice` needs a technique".into()))?;
                let hours = match parts.next() {
                    Some(h) => h
                        .parse::<u32>()
                        .map_err(|_| ActionError::Malformed(format!("bad hour count `{}`", h)))?,
                    None => 1,
                };
                if hours == 0 || parts.next().is_some() {
                    return Err(ActionError::Malformed(format!("bad practice command `{}`", input)));
                }
                Ok(Action::PracticeTechnique {
                    id: id.to_string(),
                    hours,
                })
            }
            "join" => Ok(Action::JoinSect(argument("sect")?)),
            "task" => Ok(Action::SectTask),
            "exchange" => Ok(Action::Exchange(argument("offer")?)),
            "plant" => Ok(Action::Plant(argument("crop")?)),
            "water" => Ok(Action::Water(plot()?)),
            "fertilize" => Ok(Action::Fertilize(plot()?)),
            "harvest" => Ok(Action::Harvest),
            "expand" => Ok(Action::ExpandFarm),
            "consult" | "ask" => Ok(Action::Consult(argument("question")?)),
            "save" => Ok(Action::Save),
            "quit" | "exit" => Ok(Action::Quit),
            "" => Err(ActionError::Malformed("empty selection".into())),
            other => Err(ActionError::Malformed(format!("unknown command `{}`", other))),
        }
    }
}

/// Why an action was rejected. The turn becomes a no-op.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("malformed selection: {0}")]
    Malformed(String),
    #[error("unknown formula `{0}`")]
    UnknownFormula(String),
    #[error("unknown technique `{0}`")]
    UnknownTechnique(String),
    #[error("no artifact `{0}` in the inventory")]
    UnknownItem(String),
    #[error("artifact `{0}` is already at its grade maximum")]
    FullyRefined(String),
    #[error("unknown sect `{0}`")]
    UnknownSect(String),
    #[error("unknown exchange offer `{0}`")]
    UnknownOffer(String),
    #[error("unknown crop `{0}`")]
    UnknownCrop(String),
    #[error(transparent)]
    Explore(#[from] ExploreError),
    #[error(transparent)]
    Craft(#[from] CraftError),
    #[error(transparent)]
    Materials(#[from] StatError),
    #[error(transparent)]
    Technique(#[from] TechniqueError),
    #[error(transparent)]
    Quest(#[from] GraphError),
    #[error(transparent)]
    Sect(#[from] SectError),
    #[error(transparent)]
    Farm(#[from] FarmError),
}

/// What the dispatched action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Cultivated(AdvanceOutcome),
    Rested { progress: u32 },
    Explored(ExplorationOutcome),
    Crafted(CraftOutcome),
    Refined { item: String, outcome: RefineOutcome },
    QuestAccepted(String),
    QuestAbandoned(String),
    Learned { technique: String, cost: u64 },
    Practiced { technique: String, outcome: PracticeOutcome },
    SectJoin(JoinOutcome),
    SectTask(TaskOutcome),
    Exchanged { offer: String, remaining: u64 },
    Planted { crop: String, plot: usize, slot: usize },
    Watered { plot: usize, water: u32 },
    Fertilized { plot: usize, level: u32 },
    Harvested(HarvestOutcome),
    FarmExpanded { cost: u64, plots: usize },
    Consulted(String),
    Saved,
    Quit,
    Rejected(ActionError),
}

// ── Reports and errors ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnWarning {
    #[error("save failed: {0}")]
    SaveFailed(String),
    #[error("guide unavailable: {0}")]
    GuideUnavailable(CompletionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `elapsed_turns` reached the configured lifespan
    Lifespan,
    /// Final tier with a full progress bucket
    Ascended,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnError {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("session aborted after an invariant violation")]
    Aborted,
    #[error("session finished ({0:?})")]
    Finished(EndReason),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error("snapshot rejected: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("no save in slot `{0}`")]
    NoSave(String),
}

/// Everything one turn did.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// `elapsed_turns` before this turn
    pub turn: u64,
    /// Projection taken before the action
    pub status: StatusView,
    pub world_refreshed: bool,
    pub result: ActionResult,
    pub events: Vec<EventOutcome>,
    /// Crops that matured this turn
    pub matured: Vec<String>,
    pub completed_quests: Vec<String>,
    pub unlocked_achievements: Vec<String>,
    pub warnings: Vec<TurnWarning>,
    pub saved: bool,
    pub finished: Option<EndReason>,
}

impl TurnReport {
    pub fn is_rejected(&self) -> bool {
        matches!(self.result, ActionResult::Rejected(_))
    }
}

// ── Views ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub name: String,
    pub tier_index: usize,
    pub tier_name: String,
    pub progress: u32,
    pub elapsed_turns: u64,
    pub attributes: BTreeMap<Attribute, u32>,
    pub resources: BTreeMap<String, u64>,
    pub season: Season,
    pub weather: Weather,
    pub ambient_potency: u32,
    /// Learned technique ids with mastery
    pub techniques: Vec<(String, f32)>,
    /// Owned artifact ids with refinement level
    pub items: Vec<(String, u32)>,
    pub sect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveView {
    pub id: String,
    pub description: String,
    pub current: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub objectives: Vec<ObjectiveView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementView {
    pub id: String,
    pub title: String,
    pub description: String,
}

// ── Session ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Running,
    Finished(EndReason),
    Aborted,
}

/// One participant's game.
pub struct GameSession {
    config: SimConfig,
    content: Arc<Content>,
    world: SharedWorld,
    model: StatModel,
    quests: DependencyGraph,
    achievements: AchievementTracker,
    /// Owned artifacts by content id
    items: BTreeMap<String, RefinableItem>,
    techniques: TechniqueBook,
    sect: SectStanding,
    farm: Farm,
    events: EventScheduler,
    battle: Box<dyn BattleResolver>,
    guide: Guide,
    store: Box<dyn SaveStore + Send>,
    rng: StdRng,
    lifecycle: SessionStatus,
}

impl GameSession {
    /// Fresh participant at tier 0.
    pub fn new(
        name: &str,
        config: SimConfig,
        content: Arc<Content>,
        world: SharedWorld,
        store: Box<dyn SaveStore + Send>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let guide = Guide::new(
            Box::new(OfflineGuide::new(content.guide_lines.clone())),
            config.guide_history,
        );
        let session = Self {
            quests: content.quest_graph()?,
            achievements: AchievementTracker::new(content.achievements.clone())?,
            events: EventScheduler::new(config.event_base_chance, content.events.clone()),
            model: if config.starting_attributes.is_empty() {
                StatModel::new(name)
            } else {
                StatModel::with_allocation(name, &config.starting_attributes).map_err(ConfigError::from)?
            },
            items: BTreeMap::new(),
            techniques: TechniqueBook::new(),
            sect: SectStanding::new(),
            farm: Farm::new(),
            battle: Box::new(DuelResolver),
            guide,
            store,
            rng,
            lifecycle: SessionStatus::Running,
            config,
            content,
            world,
        };
        log::info!("New session for {}", session.model.name);
        Ok(session)
    }

    /// Rebuild a session from a snapshot.
    pub fn resume(
        snapshot: Snapshot,
        config: SimConfig,
        content: Arc<Content>,
        world: SharedWorld,
        store: Box<dyn SaveStore + Send>,
    ) -> Result<Self, SessionError> {
        snapshot.stats.validate(content.tier_count())?;
        let mut session = Self::new(&snapshot.stats.name, config, content, world, store)?;
        session.quests.restore(
            &snapshot.completed_quests,
            &snapshot.failed_quests,
            &snapshot.active_quests,
        )?;
        session.achievements.restore(&snapshot.unlocked_achievements)?;
        session.model = snapshot.stats;
        session.items = snapshot.items;
        session.techniques = snapshot.techniques;
        session.sect = snapshot.sect;
        session.farm = snapshot.farm;
        log::info!(
            "Resumed {} at turn {}",
            session.model.name,
            snapshot.committed_turn
        );
        Ok(session)
    }

    /// Resume from the configured save slot of `store`.
    pub fn load(
        config: SimConfig,
        content: Arc<Content>,
        world: SharedWorld,
        store: Box<dyn SaveStore + Send>,
    ) -> Result<Self, SessionError> {
        let slot = config.save_slot.clone();
        let snapshot = store.load(&slot)?.ok_or(SessionError::NoSave(slot))?;
        Self::resume(snapshot, config, content, world, store)
    }

    pub fn with_battle_resolver(mut self, resolver: Box<dyn BattleResolver>) -> Self {
        self.battle = resolver;
        self
    }

    pub fn with_completion_service(mut self, service: Box<dyn CompletionService>) -> Self {
        self.guide.set_service(service);
        self
    }

    pub fn model(&self) -> &StatModel {
        &self.model
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn guide(&self) -> &Guide {
        &self.guide
    }

    pub fn sect(&self) -> &SectStanding {
        &self.sect
    }

    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    pub fn pending_events(&self) -> usize {
        self.events.pending()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == SessionStatus::Running
    }

    pub fn is_aborted(&self) -> bool {
        self.lifecycle == SessionStatus::Aborted
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.lifecycle {
            SessionStatus::Finished(reason) => Some(reason),
            _ => None,
        }
    }

    /// Persisted record of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            stats: self.model.clone(),
            completed_quests: self.quests.completed_ids(),
            failed_quests: self.quests.failed_ids(),
            active_quests: self.quests.active_progress(),
            unlocked_achievements: self.achievements.unlocked_ids(),
            items: self.items.clone(),
            techniques: self.techniques.clone(),
            sect: self.sect.clone(),
            farm: self.farm.clone(),
            committed_turn: self.model.elapsed_turns(),
        }
    }

    /// Write a snapshot to the configured slot.
    pub fn save(&mut self) -> Result<(), SaveError> {
        if self.is_aborted() {
            return Err(SaveError::SessionAborted);
        }
        let snapshot = self.snapshot();
        self.store.save(&self.config.save_slot, &snapshot)?;
        log::info!(
            "Saved {} at turn {} to slot {}",
            self.model.name,
            snapshot.committed_turn,
            self.config.save_slot
        );
        Ok(())
    }

    // ── Turn loop ──────────────────────────────────────────────────────

    /// Parse a menu selection and play it. A number picks from
    /// [`available_actions`](Self::available_actions), counting from 1;
    /// anything else is read as a command.
    pub fn run_selection(&mut self, selection: &str) -> Result<TurnReport, TurnError> {
        let parsed = match selection.trim().parse::<usize>() {
            Ok(index) => self
                .available_actions()
                .into_iter()
                .nth(index.wrapping_sub(1))
                .ok_or_else(|| ActionError::Malformed(format!("no menu entry {}", index))),
            Err(_) => selection.parse::<Action>(),
        };
        match parsed {
            Ok(action) => self.run_turn(action),
            Err(e) => self.reject(e),
        }
    }

    /// Play one turn.
    pub fn run_turn(&mut self, action: Action) -> Result<TurnReport, TurnError> {
        let mut report = self.begin_turn()?;

        let result = match self.dispatch(action, &mut report) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{}: action rejected: {}", self.model.name, e);
                report.result = ActionResult::Rejected(e);
                return Ok(report);
            }
        };
        let quit = matches!(result, ActionResult::Quit);
        report.result = result;
        if quit {
            self.finish(EndReason::Quit, &mut report);
            return Ok(report);
        }

        // 6. time advance and crop growth
        self.model.advance_turn();
        let rng = &mut self.rng;
        report.matured = self.farm.tick(&self.content.crops, &self.model, || {
            rng.gen_range(farming::QUALITY_JITTER)
        });

        // 7. events, then quest bookkeeping
        let potency = read_world(&self.world).ambient_potency;
        if let Some(event) = self.events.generate(report.turn, potency, &mut self.rng) {
            self.events.enqueue(event);
        }
        let mut ctx = EventContext {
            model: &mut self.model,
            opponents: &self.content.opponents,
            battle: &mut *self.battle,
            rng: &mut self.rng,
        };
        report.events = self.events.resolve_pending(&mut ctx);
        for outcome in &report.events {
            for (objective, amount) in &outcome.objectives {
                self.quests.record_progress(objective, *amount);
            }
        }
        self.settle_quests(&mut report);

        // 8. invariants
        if let Err(violation) = self.validate() {
            return Err(self.abort(violation));
        }

        // 9. autosave
        if self.model.elapsed_turns() % self.config.autosave_interval == 0 {
            self.save_into_report(&mut report);
        }

        if let Some(reason) = self.check_end() {
            self.finish(reason, &mut report);
        }
        Ok(report)
    }

    /// Steps 1-4, shared by every turn including rejected ones.
    fn begin_turn(&mut self) -> Result<TurnReport, TurnError> {
        match self.lifecycle {
            SessionStatus::Aborted => return Err(TurnError::Aborted),
            SessionStatus::Finished(reason) => return Err(TurnError::Finished(reason)),
            SessionStatus::Running => {}
        }

        // 1. queue empty
        if !self.events.is_empty() {
            return Err(self.abort(InvariantViolation::EventBacklog(self.events.pending())));
        }
        let turn = self.model.elapsed_turns();

        // 2. environment
        let world_refreshed = maybe_refresh(
            &self.world,
            turn,
            self.config.world_refresh_interval,
            &mut self.rng,
        );

        // 3. status
        let status = self.status();

        let mut report = TurnReport {
            turn,
            status,
            world_refreshed,
            result: ActionResult::Rejected(ActionError::Malformed("not dispatched".into())),
            events: Vec::new(),
            matured: Vec::new(),
            completed_quests: Vec::new(),
            unlocked_achievements: Vec::new(),
            warnings: Vec::new(),
            saved: false,
            finished: None,
        };

        // 4. story triggers and achievements
        self.apply_story_triggers();
        for node in self.achievements.check(&self.model) {
            node.reward.apply(&mut self.model);
            report.unlocked_achievements.push(node.id);
        }
        Ok(report)
    }

    fn reject(&mut self, error: ActionError) -> Result<TurnReport, TurnError> {
        let mut report = self.begin_turn()?;
        log::warn!("{}: selection rejected: {}", self.model.name, error);
        report.result = ActionResult::Rejected(error);
        Ok(report)
    }

    fn dispatch(&mut self, action: Action, report: &mut TurnReport) -> Result<ActionResult, ActionError> {
        let content = Arc::clone(&self.content);
        let potency = read_world(&self.world).ambient_potency;

        let result = match action {
            Action::Cultivate => {
                let outcome = advance(
                    &mut self.model,
                    content.tier_count(),
                    &self.config.progression,
                    &mut self.rng,
                );
                if outcome.is_breakthrough() {
                    self.record_objective(objectives::BREAKTHROUGH, 1);
                }
                ActionResult::Cultivated(outcome)
            }
            Action::Rest => ActionResult::Rested {
                progress: rest(&mut self.model, &self.config.progression),
            },
            Action::Explore(location) => {
                let outcome = explore(
                    &mut self.model,
                    &content,
                    &location,
                    &mut *self.battle,
                    &mut self.rng,
                )?;
                for (objective, amount) in &outcome.objectives {
                    self.record_objective(objective, *amount);
                }
                if let Some(id) = &outcome.item {
                    if let Some(item) = content.artifacts.get(id) {
                        if !self.items.contains_key(id) {
                            log::info!("{} obtained {}", self.model.name, item.name);
                            self.items.insert(id.clone(), item.clone());
                        }
                    }
                }
                ActionResult::Explored(outcome)
            }
            Action::Craft(id) => {
                let formula = content
                    .formula(&id)
                    .ok_or_else(|| ActionError::UnknownFormula(id.clone()))?;
                let quality = formula.material_quality(&content.ingredients);
                let sample = self.rng.gen::<f64>();
                let outcome = crafting::craft(&mut self.model, formula, quality, potency, sample)?;
                if matches!(outcome, CraftOutcome::Crafted { .. }) {
                    self.record_objective(objectives::CRAFT_PILL, 1);
                }
                ActionResult::Crafted(outcome)
            }
            Action::Refine(id) => {
                let item = self
                    .items
                    .get_mut(&id)
                    .ok_or_else(|| ActionError::UnknownItem(id.clone()))?;
                if !item.can_refine() {
                    return Err(ActionError::FullyRefined(id));
                }
                let recipe = content.refinement_recipe(item.level);
                let sample = self.rng.gen::<f64>();
                let outcome = crafting::refine(&mut self.model, item, recipe, potency, sample)?;
                if matches!(outcome, RefineOutcome::Refined { .. }) {
                    self.record_objective(objectives::REFINE_ARTIFACT, 1);
                }
                ActionResult::Refined { item: id, outcome }
            }
            Action::AcceptQuest(id) => {
                self.quests.start(&id)?;
                log::info!("{} accepted quest {}", self.model.name, id);
                ActionResult::QuestAccepted(id)
            }
            Action::AbandonQuest(id) => {
                self.quests.fail(&id)?;
                ActionResult::QuestAbandoned(id)
            }
            Action::LearnTechnique(id) => {
                let def = content
                    .technique(&id)
                    .ok_or_else(|| ActionError::UnknownTechnique(id.clone()))?;
                let cost = self.techniques.learn(def, &mut self.model)?;
                ActionResult::Learned { technique: id, cost }
            }
            Action::PracticeTechnique { id, hours } => {
                let outcome = self.techniques.practice(&id, &self.model, hours)?;
                if outcome.became_proficient {
                    if let Some(def) = content.technique(&id) {
                        for attribute in def.effects.keys() {
                            self.model.raise_attribute(*attribute, 1);
                        }
                        log::info!("{} is now proficient in {}", self.model.name, def.name);
                    }
                }
                ActionResult::Practiced {
                    technique: id,
                    outcome,
                }
            }
            Action::JoinSect(id) => {
                let def = content
                    .sect(&id)
                    .ok_or_else(|| ActionError::UnknownSect(id.clone()))?;
                self.sect.check_join(&self.model)?;
                let sample = self.rng.gen::<f64>();
                let outcome = self.sect.join(def, &mut self.model, sample)?;
                if matches!(outcome, JoinOutcome::Joined { .. }) {
                    self.record_objective(objectives::JOIN_SECT, 1);
                }
                ActionResult::SectJoin(outcome)
            }
            Action::SectTask => {
                if !self.sect.is_member() {
                    return Err(SectError::NotMember.into());
                }
                let difficulty = self.rng.gen_range(sect::TASK_DIFFICULTY);
                let sample = self.rng.gen::<f64>();
                let bonus = self.rng.gen::<f64>();
                let outcome = self.sect.perform_task(&mut self.model, difficulty, sample, bonus)?;
                ActionResult::SectTask(outcome)
            }
            Action::Exchange(id) => {
                let offer = content
                    .exchange_offer(&id)
                    .ok_or_else(|| ActionError::UnknownOffer(id.clone()))?;
                let remaining = self.sect.exchange(offer, &mut self.model)?;
                ActionResult::Exchanged { offer: id, remaining }
            }
            Action::Plant(id) => {
                let def = content
                    .crop(&id)
                    .ok_or_else(|| ActionError::UnknownCrop(id.clone()))?;
                let (plot, slot) = self.farm.plant(def, &self.model)?;
                ActionResult::Planted { crop: id, plot, slot }
            }
            Action::Water(plot) => ActionResult::Watered {
                plot,
                water: self.farm.water(plot)?,
            },
            Action::Fertilize(plot) => ActionResult::Fertilized {
                plot,
                level: self.farm.fertilize(plot)?,
            },
            Action::Harvest => {
                let outcome = self.farm.harvest(&content.crops, &mut self.model)?;
                for (objective, amount) in &outcome.objectives {
                    self.record_objective(objective, *amount);
                }
                ActionResult::Harvested(outcome)
            }
            Action::ExpandFarm => {
                let cost = self.farm.expand(&mut self.model)?;
                ActionResult::FarmExpanded {
                    cost,
                    plots: self.farm.plots().len(),
                }
            }
            Action::Consult(question) => {
                let context = format!(
                    "{} is a {} cultivator with {} progress after {} turns.",
                    self.model.name,
                    content.tier_name(self.model.tier_index()),
                    self.model.progress_points(),
                    self.model.elapsed_turns()
                );
                let reply = self.guide.consult(&question, &context);
                if let Some(error) = reply.error {
                    report.warnings.push(TurnWarning::GuideUnavailable(error));
                }
                ActionResult::Consulted(reply.text)
            }
            Action::Save => {
                self.save_into_report(report);
                ActionResult::Saved
            }
            Action::Quit => ActionResult::Quit,
        };

        self.settle_quests(report);
        Ok(result)
    }

    fn record_objective(&mut self, objective: &str, amount: u32) {
        let touched = self.quests.record_progress(objective, amount);
        if !touched.is_empty() {
            log::debug!("Objective {} +{} on {:?}", objective, amount, touched);
        }
    }

    /// Complete satisfied quests and hand out their rewards.
    fn settle_quests(&mut self, report: &mut TurnReport) {
        self.quests.check_all_active();
        for node in self.quests.take_rewards() {
            node.reward.apply(&mut self.model);
            self.model
                .set_flag(&format!("{}{}", flags::COMPLETED_PREFIX, node.id));
            log::info!("{} completed quest {}", self.model.name, node.title);
            report.completed_quests.push(node.id);
        }
    }

    fn apply_story_triggers(&mut self) {
        if self.model.tier_index() > 0 && self.model.set_flag(flags::FIRST_BREAKTHROUGH) {
            log::info!("{} achieved a first breakthrough", self.model.name);
        }
    }

    fn validate(&self) -> Result<(), InvariantViolation> {
        self.model.validate(self.content.tier_count())?;
        if !self.events.is_empty() {
            return Err(InvariantViolation::EventBacklog(self.events.pending()));
        }
        Ok(())
    }

    fn abort(&mut self, violation: InvariantViolation) -> TurnError {
        log::error!("{}: {}; session aborted", self.model.name, violation);
        self.lifecycle = SessionStatus::Aborted;
        TurnError::Invariant(violation)
    }

    fn save_into_report(&mut self, report: &mut TurnReport) {
        match self.save() {
            Ok(()) => report.saved = true,
            Err(e) => {
                log::warn!("{}: save failed: {}", self.model.name, e);
                report.warnings.push(TurnWarning::SaveFailed(e.to_string()));
            }
        }
    }

    fn check_end(&self) -> Option<EndReason> {
        if self.model.elapsed_turns() >= self.config.lifespan_turns {
            Some(EndReason::Lifespan)
        } else if rules::is_final_tier(&self.model, self.content.tier_count())
            && self.model.progress_points() >= MAX_PROGRESS
        {
            Some(EndReason::Ascended)
        } else {
            None
        }
    }

    fn finish(&mut self, reason: EndReason, report: &mut TurnReport) {
        if reason == EndReason::Quit {
            self.save_into_report(report);
        }
        log::info!(
            "{}'s session ended after {} turns ({:?})",
            self.model.name,
            self.model.elapsed_turns(),
            reason
        );
        self.lifecycle = SessionStatus::Finished(reason);
        report.finished = Some(reason);
    }

    // ── Projections ────────────────────────────────────────────────────

    pub fn world(&self) -> WorldState {
        read_world(&self.world)
    }

    pub fn status(&self) -> StatusView {
        let world = read_world(&self.world);
        StatusView {
            name: self.model.name.clone(),
            tier_index: self.model.tier_index(),
            tier_name: self.content.tier_name(self.model.tier_index()).to_string(),
            progress: self.model.progress_points(),
            elapsed_turns: self.model.elapsed_turns(),
            attributes: self.model.attributes().clone(),
            resources: self.model.resources().clone(),
            season: world.season,
            weather: world.weather,
            ambient_potency: world.ambient_potency,
            techniques: self
                .techniques
                .iter()
                .map(|(id, mastery)| (id.to_string(), mastery))
                .collect(),
            items: self
                .items
                .iter()
                .map(|(id, item)| (id.clone(), item.level))
                .collect(),
            sect: self.sect.sect().map(str::to_string),
        }
    }

    /// Every action that could succeed right now, in menu order.
    pub fn available_actions(&self) -> Vec<Action> {
        let tier = self.model.tier_index();
        let rank = crafting::alchemy_rank(self.model.skill(skills::ALCHEMY));

        let mut actions = vec![Action::Cultivate, Action::Rest];
        actions.extend(
            self.content
                .locations
                .iter()
                .filter(|l| l.min_tier <= tier)
                .map(|l| Action::Explore(l.id.clone())),
        );
        actions.extend(
            self.content
                .formulas
                .iter()
                .filter(|f| f.level <= rank)
                .map(|f| Action::Craft(f.id.clone())),
        );
        actions.extend(
            self.items
                .iter()
                .filter(|(_, item)| item.can_refine())
                .map(|(id, _)| Action::Refine(id.clone())),
        );
        actions.extend(self.quest_ids_in_order(&self.quests.available()).map(Action::AcceptQuest));
        actions.extend(
            self.content
                .techniques
                .iter()
                .filter(|t| !self.techniques.is_learned(&t.id) && t.check_requirements(&self.model).is_ok())
                .map(|t| Action::LearnTechnique(t.id.clone())),
        );
        actions.extend(self.techniques.iter().map(|(id, _)| Action::PracticeTechnique {
            id: id.to_string(),
            hours: 1,
        }));
        if self.sect.check_join(&self.model).is_ok() {
            actions.extend(self.content.sects.iter().map(|s| Action::JoinSect(s.id.clone())));
        }
        if self.sect.is_member() {
            actions.push(Action::SectTask);
            let contribution = self.model.resource(resources::CONTRIBUTION);
            actions.extend(
                self.content
                    .sect_exchange
                    .iter()
                    .filter(|o| o.cost <= contribution)
                    .map(|o| Action::Exchange(o.id.clone())),
            );
        }
        actions.extend(self.farm_actions());
        actions.push(Action::Consult(DEFAULT_QUESTION.to_string()));
        actions.push(Action::Save);
        actions.push(Action::Quit);
        actions
    }

    fn farm_actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.farm.free_slot().is_some() {
            actions.extend(
                self.content
                    .crops
                    .iter()
                    .filter(|c| c.check_requirements(&self.model).is_ok())
                    .map(|c| Action::Plant(c.id.clone())),
            );
        }
        for (index, plot) in self.farm.plots().iter().enumerate() {
            if !plot.is_planted() {
                continue;
            }
            if plot.water() < farming::MAX_WATER {
                actions.push(Action::Water(index));
            }
            if self.farm.fertilizer_stock() > 0 && plot.fertilizer() < farming::MAX_FERTILIZER {
                actions.push(Action::Fertilize(index));
            }
        }
        if self.farm.has_harvest() {
            actions.push(Action::Harvest);
        }
        if self.farm.plots().len() < farming::MAX_PLOTS
            && self.model.resource(resources::SPIRIT_STONES) >= self.farm.expansion_cost()
        {
            actions.push(Action::ExpandFarm);
        }
        actions
    }

    fn quest_ids_in_order<'a>(
        &'a self,
        ids: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = String> + 'a {
        self.quests
            .nodes()
            .filter(move |n| ids.contains(&n.id))
            .map(|n| n.id.clone())
    }

    fn quest_view(&self, id: &str) -> Option<QuestView> {
        let def = self.quests.node(id)?;
        let progress = self.quests.progress(id);
        Some(QuestView {
            id: def.id.clone(),
            title: def.title.clone(),
            description: def.description.clone(),
            objectives: def
                .objectives
                .iter()
                .map(|o| ObjectiveView {
                    id: o.id.clone(),
                    description: o.description.clone(),
                    current: progress.and_then(|p| p.get(&o.id)).copied().unwrap_or(0),
                    target: o.target,
                })
                .collect(),
        })
    }

    pub fn available_quests(&self) -> Vec<QuestView> {
        let available = self.quests.available();
        self.quest_ids_in_order(&available)
            .filter_map(|id| self.quest_view(&id))
            .collect()
    }

    pub fn active_quests(&self) -> Vec<QuestView> {
        let active = self.quests.active_progress();
        self.quests
            .nodes()
            .filter(|n| active.contains_key(&n.id))
            .filter_map(|n| self.quest_view(&n.id))
            .collect()
    }

    pub fn unlocked_achievements(&self) -> Vec<AchievementView> {
        self.achievements
            .unlocked()
            .into_iter()
            .map(|def| AchievementView {
                id: def.id.clone(),
                title: def.title.clone(),
                description: def.description.clone(),
            })
            .collect()
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("model", &self.model)
            .field("lifecycle", &self.lifecycle)
            .field("items", &self.items.len())
            .finish()
    }
}
