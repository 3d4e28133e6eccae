//! Three-step design wizard and the surrounding studio views.
//!
//! `Wizard` owns one session's selections and uploads and enforces the step
//! guards. `Studio` is the outer screen state: dashboard, wizard, or the last
//! generated result.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::gemini::{GenerationError, GenerationRequest, ImagePart};
use crate::intake::{IntakeError, SelectionToken, SelectionTracker};
use crate::models::{
    AssetSlot, ConfigUpdate, DesignConfig, GenerationResult, InvalidSubType, SessionView,
    UploadedFile, ViewKind, WizardView,
};
use crate::prompt::build_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    Configure = 1,
    Upload = 2,
    Instructions = 3,
}

impl WizardStep {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::Configure => Some(WizardStep::Upload),
            WizardStep::Upload => Some(WizardStep::Instructions),
            WizardStep::Instructions => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            WizardStep::Configure => None,
            WizardStep::Upload => Some(WizardStep::Configure),
            WizardStep::Instructions => Some(WizardStep::Upload),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("Upload a main product image before continuing")]
    GuardRefused,
    #[error("A main product image is required to generate a design")]
    NoMainImage,
    #[error("A design is already being generated")]
    GenerationInFlight,
    #[error("Cannot go {direction} from step {step}")]
    NoSuchTransition { step: u8, direction: &'static str },
    #[error("Designs are generated from the instructions step")]
    NotOnInstructionsStep,
    #[error("Action not available on the {actual:?} view")]
    WrongView { actual: ViewKind },
    #[error(transparent)]
    InvalidSubType(#[from] InvalidSubType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    wizard: Uuid,
    slot: AssetSlot,
    token: SelectionToken,
}

impl UploadTicket {
    pub fn slot(&self) -> AssetSlot {
        self.slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    wizard: Uuid,
    seq: u64,
}

/// Everything the remote call needs, snapshotted when Generate is pressed.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub ticket: GenerationTicket,
    pub request: GenerationRequest,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted,
    Rejected(IntakeError),
    Stale,
}

#[derive(Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    Succeeded,
    Failed(String),
    Discarded,
}

#[derive(Debug, Default, Clone)]
struct Slot {
    file: Option<UploadedFile>,
    selections: SelectionTracker,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Wizard {
    id: Uuid,
    step: WizardStep,
    config: DesignConfig,
    main: Slot,
    logo: Slot,
    in_flight: Option<GenerationTicket>,
    issued: u64,
    error: Option<String>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: WizardStep::Configure,
            config: DesignConfig::default(),
            main: Slot::default(),
            logo: Slot::default(),
            in_flight: None,
            issued: 0,
            error: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[cfg(test)]
    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn main_image(&self) -> Option<&UploadedFile> {
        self.main.file.as_ref()
    }

    #[cfg(test)]
    pub fn logo_image(&self) -> Option<&UploadedFile> {
        self.logo.file.as_ref()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn upload(&self, slot: AssetSlot) -> Option<&UploadedFile> {
        self.slot(slot).file.as_ref()
    }

    fn slot(&self, slot: AssetSlot) -> &Slot {
        match slot {
            AssetSlot::Main => &self.main,
            AssetSlot::Logo => &self.logo,
        }
    }

    fn slot_mut(&mut self, slot: AssetSlot) -> &mut Slot {
        match slot {
            AssetSlot::Main => &mut self.main,
            AssetSlot::Logo => &mut self.logo,
        }
    }

    /// Whether "Next" is enabled on the current step. Only the upload step has a
    /// requirement, and the logo never counts toward it.
    pub fn can_advance(&self) -> bool {
        match self.step {
            WizardStep::Configure => true,
            WizardStep::Upload => self.main.file.is_some(),
            WizardStep::Instructions => false,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.step.previous().is_some() && !self.is_generating()
    }

    pub fn can_generate(&self) -> bool {
        self.step == WizardStep::Instructions && self.main.file.is_some() && !self.is_generating()
    }

    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        let next = self.step.next()
            .ok_or(WizardError::NoSuchTransition { step: self.step.ordinal(), direction: "forward" })?;
        if !self.can_advance() {
            return Err(WizardError::GuardRefused);
        }
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> Result<WizardStep, WizardError> {
        let previous = self.step.previous()
            .ok_or(WizardError::NoSuchTransition { step: self.step.ordinal(), direction: "back" })?;
        if self.is_generating() {
            return Err(WizardError::GenerationInFlight);
        }
        self.step = previous;
        Ok(previous)
    }

    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<&DesignConfig, WizardError> {
        self.config.apply(update)?;
        Ok(&self.config)
    }

    /// Marks a new selection in `slot`. Any read still running for an older
    /// selection in the same slot becomes stale.
    pub fn begin_upload(&mut self, slot: AssetSlot) -> UploadTicket {
        let token = self.slot_mut(slot).selections.begin();
        UploadTicket { wizard: self.id, slot, token }
    }

    pub fn complete_upload(&mut self, ticket: UploadTicket, read: Result<UploadedFile, IntakeError>) -> UploadOutcome {
        let wizard = self.id;
        let slot = self.slot_mut(ticket.slot);
        if ticket.wizard != wizard || !slot.selections.is_current(ticket.token) {
            warn!(slot = %ticket.slot, "Discarding stale upload completion");
            return UploadOutcome::Stale;
        }
        match read {
            Ok(file) => {
                slot.file = Some(file);
                slot.error = None;
                UploadOutcome::Accepted
            }
            Err(e) => {
                slot.error = Some(e.to_string());
                UploadOutcome::Rejected(e)
            }
        }
    }

    pub fn clear_upload(&mut self, slot: AssetSlot) {
        let slot = self.slot_mut(slot);
        slot.selections.begin();
        slot.file = None;
        slot.error = None;
    }

    /// Enters the loading state and snapshots the request for the remote call.
    pub fn begin_generation(&mut self) -> Result<GenerationJob, WizardError> {
        if self.step != WizardStep::Instructions {
            return Err(WizardError::NotOnInstructionsStep);
        }
        if self.is_generating() {
            return Err(WizardError::GenerationInFlight);
        }
        let main = self.main.file.as_ref().ok_or(WizardError::NoMainImage)?;

        self.issued += 1;
        let ticket = GenerationTicket { wizard: self.id, seq: self.issued };
        let request = GenerationRequest {
            main_image: ImagePart::from(main),
            logo_image: self.logo.file.as_ref().map(ImagePart::from),
            prompt: build_prompt(&self.config),
        };
        self.in_flight = Some(ticket);
        self.error = None;
        Ok(GenerationJob { ticket, request })
    }

    /// Applies a finished remote call. Returns the result only on success for the
    /// current ticket; failures stay on the instructions step with an inline error.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        prompt: String,
        model: &str,
        outcome: Result<String, GenerationError>,
    ) -> (GenerationOutcome, Option<GenerationResult>) {
        if self.in_flight != Some(ticket) {
            warn!("Discarding completion of an abandoned generation");
            return (GenerationOutcome::Discarded, None);
        }
        self.in_flight = None;
        match outcome {
            Ok(image_url) => {
                let result = GenerationResult { image_url, prompt_used: prompt, model: model.to_string(), created_at: Utc::now() };
                (GenerationOutcome::Succeeded, Some(result))
            }
            Err(e) => {
                let message = e.user_message();
                self.error = Some(message.clone());
                (GenerationOutcome::Failed(message), None)
            }
        }
    }

    /// Drops the loading state so a late completion is discarded.
    pub fn cancel_generation(&mut self) -> bool {
        self.in_flight.take().is_some()
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            step: self.step.ordinal(),
            config: self.config.clone(),
            summary: self.config.summary(),
            main_image: self.main.file.as_ref().map(UploadedFile::summary),
            logo_image: self.logo.file.as_ref().map(UploadedFile::summary),
            main_image_error: self.main.error.clone(),
            logo_image_error: self.logo.error.clone(),
            can_advance: self.can_advance(),
            can_go_back: self.can_go_back(),
            can_generate: self.can_generate(),
            is_generating: self.is_generating(),
            error: self.error.clone(),
        }
    }
}

/// Outer application state for one user.
#[derive(Debug, Clone)]
pub struct Studio {
    view: ViewKind,
    wizard: Option<Wizard>,
    result: Option<GenerationResult>,
}

impl Default for Studio {
    fn default() -> Self {
        Self::new()
    }
}

impl Studio {
    pub fn new() -> Self {
        Self { view: ViewKind::Dashboard, wizard: None, result: None }
    }

    pub fn view_kind(&self) -> ViewKind {
        self.view
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.wizard.as_ref().is_some_and(Wizard::is_generating)
    }

    /// The active wizard; only reachable while the wizard view is showing.
    pub fn wizard(&self) -> Result<&Wizard, WizardError> {
        match (&self.view, &self.wizard) {
            (ViewKind::Wizard, Some(w)) => Ok(w),
            _ => Err(WizardError::WrongView { actual: self.view }),
        }
    }

    pub fn wizard_mut(&mut self) -> Result<&mut Wizard, WizardError> {
        match (&self.view, &mut self.wizard) {
            (ViewKind::Wizard, Some(w)) => Ok(w),
            _ => Err(WizardError::WrongView { actual: self.view }),
        }
    }

    /// Opens a fresh wizard at step 1 from any view. Returns true when a
    /// generation in flight was abandoned.
    pub fn start_wizard(&mut self) -> bool {
        let abandoned = self.is_generating();
        self.wizard = Some(Wizard::new());
        self.view = ViewKind::Wizard;
        abandoned
    }

    pub fn begin_generation(&mut self) -> Result<GenerationJob, WizardError> {
        self.wizard_mut()?.begin_generation()
    }

    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        prompt: String,
        model: &str,
        outcome: Result<String, GenerationError>,
    ) -> GenerationOutcome {
        let Ok(wizard) = self.wizard_mut() else {
            warn!("Discarding generation completion outside the wizard");
            return GenerationOutcome::Discarded;
        };
        let (outcome, result) = wizard.finish_generation(ticket, prompt, model, outcome);
        if let Some(result) = result {
            info!("✅ Design ready, showing result");
            self.result = Some(result);
            self.view = ViewKind::ShowingResult;
        }
        outcome
    }

    /// "Create Another": fresh wizard, uploads cleared.
    pub fn create_another(&mut self) -> Result<(), WizardError> {
        self.require(ViewKind::ShowingResult)?;
        self.start_wizard();
        Ok(())
    }

    /// Back to the instructions step with the previous selections and uploads.
    pub fn regenerate(&mut self) -> Result<(), WizardError> {
        self.require(ViewKind::ShowingResult)?;
        match self.wizard.as_mut() {
            Some(wizard) => {
                wizard.step = WizardStep::Instructions;
                wizard.error = None;
                self.view = ViewKind::Wizard;
                Ok(())
            }
            None => Err(WizardError::WrongView { actual: self.view }),
        }
    }

    /// Leaves whatever is showing, keeping the last result. Returns true when a
    /// generation in flight was abandoned.
    pub fn back_to_dashboard(&mut self) -> bool {
        let abandoned = self.wizard.as_mut().is_some_and(Wizard::cancel_generation);
        self.wizard = None;
        self.view = ViewKind::Dashboard;
        abandoned
    }

    fn require(&self, expected: ViewKind) -> Result<(), WizardError> {
        if self.view == expected {
            Ok(())
        } else {
            Err(WizardError::WrongView { actual: self.view })
        }
    }

    pub fn session_view(&self, id: Uuid) -> SessionView {
        SessionView {
            id,
            view: self.view,
            wizard: self.wizard().ok().map(Wizard::view),
            result: self.result.clone(),
        }
    }
}
