//! Safety escalation path.
//!
//! ```text
//!  magnitude ──▶ ImpactDetector ──FallDetected──▶ HealthCheckOrchestrator ──AlertJob──▶ AlertDispatcher
//!               (impact)                          (health_check + response)             (alert worker)
//! ```
//!
//! Each stage owns its state; the hand-offs are single-producer events so a
//! slow webhook never stalls detection and a pending check-in never drops a
//! later fall.

pub mod alert;
pub mod health_check;
pub mod impact;
pub mod response;
