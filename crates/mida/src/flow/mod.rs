//! Captcha orchestration: the chapca exercise and the sales wizard.
//!
//! Both flows record outcomes reported by the widgets and, when a
//! playthrough ends, hand back the session document to persist. The write
//! itself belongs to the caller, which reports the result back through
//! `save_succeeded` / `save_failed`.

mod chapca;
mod guard;
mod registry;
mod sales;

pub use chapca::{ChapcaFlow, ChapcaSettings, ChapcaStep, FlowStatus, expand_plan};
pub use guard::{SaveGuard, SaveState};
pub use registry::FlowRegistry;
pub use sales::{
    Apartment, Blocked, FormField, PROJECTS, PaymentMethod, SalesForm, SalesSettings,
    SalesWizard, SelectionMethod, generate_plan, simulate_search,
};
