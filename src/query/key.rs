//! Query keys and prefix matching.
//!
//! A [`QueryKey`] names one cached result. It is a tagged union with one
//! variant per resource, so a matcher is a plain `match` instead of indexed
//! access into an untyped tuple. Every key also renders to the ordered
//! segment form `[resource, discriminator.., {params}]`, which is what
//! [`KeyPrefix`] matches against.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::api::params::{
    ChatFilterParams, CpfLookupParams, DateRangeParams, PaginationParams, RetryFilterParams,
    TransbordoFilterParams,
};

/// One segment of a rendered key.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Resource name or literal discriminator.
    Name(&'static str),
    /// Parameter bag, compared structurally.
    Params(Value),
}

impl Segment {
    fn to_value(&self) -> Value {
        match self {
            Self::Name(name) => Value::String((*name).to_string()),
            Self::Params(value) => value.clone(),
        }
    }
}

/// Cache key for every resource the dashboard reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// `["chats"]` or `["chats", {params}]`
    Chats(Option<PaginationParams>),
    /// `["chats", "filtered", {filters}]`
    FilteredChats(ChatFilterParams),
    /// `["chatMessages", {chatId}]`
    ChatMessages { chat_id: String },
    /// `["inbox", "chats", {params}]`
    InboxChats(PaginationParams),
    /// `["inbox", "chats", "filtered", {filters}]`
    FilteredInboxChats(ChatFilterParams),
    /// `["inbox", "messages", {chatId}]`
    InboxMessages { chat_id: Option<String> },
    /// `["session", "events", {chatId}]`
    SessionEvents { chat_id: Option<String> },
    /// `["transbordos", {params}]`
    Transbordos(TransbordoFilterParams),
    /// `["retries", {params}]`
    Retries(RetryFilterParams),
    /// `["cpfConsultations", {params}]`
    CpfConsultations(PaginationParams),
    /// `["cpfLookup", {params}]`
    CpfLookup(CpfLookupParams),
    /// `["dashboard"]` or `["dashboard", {params}]`
    Dashboard(Option<DateRangeParams>),
    /// `["dashboard", "summary"]` or `["dashboard", "summary", {params}]`
    DashboardSummary(Option<DateRangeParams>),
    /// `["performance"]` or `["performance", {params}]`
    Performance(Option<DateRangeParams>),
    /// `["consultations"]` or `["consultations", {params}]`
    Consultations(Option<DateRangeParams>),
    /// `["messageStats"]`
    MessageStats,
}

fn bag(field: &str, value: &impl Serialize) -> Segment {
    // Parameter structs only hold strings, integers and booleans.
    let inner = serde_json::to_value(value).unwrap_or(Value::Null);
    Segment::Params(json!({ field: inner }))
}

fn chat_id_bag(chat_id: Option<&str>) -> Segment {
    Segment::Params(json!({ "chatId": chat_id }))
}

impl QueryKey {
    /// Resource name, the first segment.
    pub const fn resource(&self) -> &'static str {
        match self {
            Self::Chats(_) | Self::FilteredChats(_) => "chats",
            Self::ChatMessages { .. } => "chatMessages",
            Self::InboxChats(_) | Self::FilteredInboxChats(_) | Self::InboxMessages { .. } => {
                "inbox"
            }
            Self::SessionEvents { .. } => "session",
            Self::Transbordos(_) => "transbordos",
            Self::Retries(_) => "retries",
            Self::CpfConsultations(_) => "cpfConsultations",
            Self::CpfLookup(_) => "cpfLookup",
            Self::Dashboard(_) | Self::DashboardSummary(_) => "dashboard",
            Self::Performance(_) => "performance",
            Self::Consultations(_) => "consultations",
            Self::MessageStats => "messageStats",
        }
    }

    /// Ordered segments: resource, literal discriminators, then the params bag.
    pub fn segments(&self) -> Vec<Segment> {
        use Segment::Name;

        let mut segments = vec![Name(self.resource())];
        match self {
            Self::Chats(params) => segments.extend(params.as_ref().map(|p| bag("params", p))),
            Self::FilteredChats(filters) => {
                segments.extend([Name("filtered"), bag("filters", filters)]);
            }
            Self::ChatMessages { chat_id } => segments.push(chat_id_bag(Some(chat_id))),
            Self::InboxChats(params) => segments.extend([Name("chats"), bag("params", params)]),
            Self::FilteredInboxChats(filters) => {
                segments.extend([Name("chats"), Name("filtered"), bag("filters", filters)]);
            }
            Self::InboxMessages { chat_id } => {
                segments.extend([Name("messages"), chat_id_bag(chat_id.as_deref())]);
            }
            Self::SessionEvents { chat_id } => {
                segments.extend([Name("events"), chat_id_bag(chat_id.as_deref())]);
            }
            Self::Transbordos(params) => segments.push(bag("params", params)),
            Self::Retries(params) => segments.push(bag("params", params)),
            Self::CpfConsultations(params) => segments.push(bag("params", params)),
            Self::CpfLookup(params) => segments.push(bag("params", params)),
            Self::Dashboard(range) | Self::Performance(range) | Self::Consultations(range) => {
                segments.extend(range.as_ref().map(|r| bag("params", r)));
            }
            Self::DashboardSummary(range) => {
                segments.push(Name("summary"));
                segments.extend(range.as_ref().map(|r| bag("params", r)));
            }
            Self::MessageStats => {}
        }
        segments
    }

    /// Returns `true` if the leading segments of this key equal `prefix`.
    pub fn starts_with(&self, prefix: &KeyPrefix) -> bool {
        let segments = self.segments();
        prefix.segments.len() <= segments.len()
            && prefix
                .segments
                .iter()
                .zip(&segments)
                .all(|(expected, actual)| expected == actual)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = Value::Array(self.segments().iter().map(Segment::to_value).collect());
        write!(f, "{rendered}")
    }
}

/// Leading segments used to select a group of keys.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPrefix {
    segments: Vec<Segment>,
}

impl KeyPrefix {
    /// A prefix of literal names, e.g. `["chats", "filtered"]`.
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            segments: names.iter().copied().map(Segment::Name).collect(),
        }
    }

    /// Appends a parameter-bag segment.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.segments.push(Segment::Params(params));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl From<&QueryKey> for KeyPrefix {
    /// The full key as a prefix: matches that key only.
    fn from(key: &QueryKey) -> Self {
        Self {
            segments: key.segments(),
        }
    }
}
