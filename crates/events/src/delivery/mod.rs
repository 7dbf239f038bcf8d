//! External delivery channels for job notifications.
//!
//! Email delivery is the only channel; the notification router falls back
//! to a log line when SMTP is not configured.

pub mod email;
