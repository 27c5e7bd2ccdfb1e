//! Request parameter bags.
//!
//! Every type here is `Hash + Eq` so it can sit inside a [`QueryKey`], and
//! `Serialize` so it doubles as the HTTP query string. Absent fields are
//! skipped on both paths.
//!
//! [`QueryKey`]: crate::query::QueryKey

use serde::{Deserialize, Serialize};

fn filled(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `limit`/`offset` pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

impl PaginationParams {
    pub const fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// The following page.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }

    /// The preceding page, clamped at zero.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_sub(self.limit),
        }
    }

    #[must_use]
    pub const fn first(self) -> Self {
        Self {
            limit: self.limit,
            offset: 0,
        }
    }

    /// One-based page number.
    pub const fn current_page(self) -> u32 {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }

    pub const fn total_pages(self, total: u64) -> u64 {
        if self.limit == 0 {
            0
        } else {
            total.div_ceil(self.limit as u64)
        }
    }
}

/// Filters for `GET /chats/filter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatFilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_balance: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instancia: Option<String>,
    #[serde(rename = "dateFrom", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl ChatFilterParams {
    #[must_use]
    pub const fn with_pagination(mut self, pagination: PaginationParams) -> Self {
        self.limit = Some(pagination.limit);
        self.offset = Some(pagination.offset);
        self
    }

    #[must_use]
    pub fn telefone(mut self, telefone: impl Into<String>) -> Self {
        self.telefone = Some(telefone.into());
        self
    }

    #[must_use]
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Returns `true` when at least one filter field is filled in.
    ///
    /// A filtered query is only executed when this holds, so a form that was
    /// reset but not cleared never turns into an unfiltered full fetch.
    /// `has_balance` only counts when it asks for chats with a balance.
    pub fn has_filters(&self) -> bool {
        filled(self.telefone.as_ref())
            || filled(self.session.as_ref())
            || filled(self.bank.as_ref())
            || self.has_balance == Some(true)
            || filled(self.instancia.as_ref())
            || filled(self.date_from.as_ref())
            || filled(self.date_to.as_ref())
    }

    /// Returns `true` when neither the phone nor the session filter is set.
    pub fn lacks_subject(&self) -> bool {
        !filled(self.telefone.as_ref()) && !filled(self.session.as_ref())
    }
}

/// Filters for `GET /transbordos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransbordoFilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agente: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo: Option<String>,
    #[serde(rename = "dateFrom", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

/// Select-box value that stands for "any code".
pub const ALL_CODES: &str = "todos";

impl TransbordoFilterParams {
    pub fn from_pagination(pagination: PaginationParams) -> Self {
        Self {
            limit: Some(pagination.limit),
            offset: Some(pagination.offset),
            ..Self::default()
        }
    }

    /// Builds filter params from raw form fields, trimming values and
    /// dropping blanks. Returns `None` when every field is blank.
    pub fn from_form(
        limit: u32,
        telefone: &str,
        session: &str,
        agente: &str,
        codigo: &str,
        date_from: &str,
        date_to: &str,
    ) -> Option<Self> {
        let params = Self {
            limit: Some(limit),
            offset: Some(0),
            telefone: non_blank(telefone),
            session: non_blank(session),
            agente: non_blank(agente),
            codigo: non_blank(codigo).filter(|c| c != ALL_CODES),
            date_from: non_blank(date_from),
            date_to: non_blank(date_to),
        };
        params.has_filters().then_some(params)
    }

    pub fn has_filters(&self) -> bool {
        filled(self.telefone.as_ref())
            || filled(self.session.as_ref())
            || filled(self.agente.as_ref())
            || self
                .codigo
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty() && c != ALL_CODES)
            || filled(self.date_from.as_ref())
            || filled(self.date_to.as_ref())
    }
}

/// Filters for `GET /retries`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryFilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flague_transbordo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tentativas_executadas: Option<String>,
    #[serde(rename = "dateFrom", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl RetryFilterParams {
    pub fn from_pagination(pagination: PaginationParams) -> Self {
        Self {
            limit: Some(pagination.limit),
            offset: Some(pagination.offset),
            ..Self::default()
        }
    }

    pub fn has_filters(&self) -> bool {
        filled(self.telefone.as_ref())
            || filled(self.session.as_ref())
            || filled(self.flague_transbordo.as_ref())
            || filled(self.tentativas_executadas.as_ref())
            || filled(self.date_from.as_ref())
            || filled(self.date_to.as_ref())
    }
}

/// Lookup filters for `GET /cpf-consultations`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CpfLookupParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agente: Option<String>,
    #[serde(rename = "dateFrom", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl CpfLookupParams {
    pub fn has_filters(&self) -> bool {
        filled(self.telefone.as_ref())
            || filled(self.session.as_ref())
            || filled(self.cpf.as_ref())
            || filled(self.agente.as_ref())
            || filled(self.date_from.as_ref())
            || filled(self.date_to.as_ref())
    }
}

/// Date range for the dashboard endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRangeParams {
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl DateRangeParams {
    /// Builds a range from raw inputs, blanks meaning "open ended".
    pub fn new(start_date: &str, end_date: &str) -> Self {
        Self {
            start_date: non_blank(start_date),
            end_date: non_blank(end_date),
        }
    }

    pub const fn is_open(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}
