// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of VoltION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::fmt;
use thiserror::Error;

/// The plant data role a Home Assistant request was serving.
///
/// Every request the client makes feeds one specific input of the control
/// loop, and a failed export-tariff read has very different consequences
/// (the whole tick fails) than a failed weather read (the load forecast
/// just loses its temperature term). Tagging errors with the role keeps
/// that distinction visible in the logs and the diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRole {
    ImportTariff,
    ExportTariff,
    SolarForecast,
    Weather,
    LoadHistory,
    Telemetry,
    CommandHook,
}

impl EntityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImportTariff => "import tariff",
            Self::ExportTariff => "export tariff",
            Self::SolarForecast => "solar forecast",
            Self::Weather => "weather",
            Self::LoadHistory => "load history",
            Self::Telemetry => "telemetry",
            Self::CommandHook => "command hook",
        }
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Home Assistant access errors, tagged with the role they interrupt.
#[derive(Error, Debug)]
pub enum HaError {
    /// The configured entity does not exist on this Home Assistant.
    #[error("{role} entity '{entity_id}' not found in Home Assistant")]
    MissingEntity { role: EntityRole, entity_id: String },

    /// The long-lived access token was rejected.
    #[error("Home Assistant rejected the access token")]
    BadToken,

    /// Home Assistant could not be reached within the retry budget.
    #[error("{role} request gave up after {attempts} attempts: {source}")]
    Unreachable {
        role: EntityRole,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Home Assistant answered with a status the client cannot act on.
    #[error("{role} request rejected with status {status}: {detail}")]
    Rejected {
        role: EntityRole,
        status: u16,
        detail: String,
    },

    /// The response body did not decode into the expected shape.
    #[error("{role} payload malformed: {detail}")]
    MalformedPayload { role: EntityRole, detail: String },

    /// A hook script could not be fired. Hook calls are never retried, so
    /// this always means the command was held back.
    #[error("hook script '{script}' failed: {detail}")]
    HookFailed { script: String, detail: String },

    /// Client-side configuration problem (base URL, token plumbing).
    #[error("Home Assistant client misconfigured: {0}")]
    Misconfigured(String),
}

pub type HaResult<T> = Result<T, HaError>;
