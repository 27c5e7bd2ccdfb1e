use chrono::{DateTime, NaiveDate, Utc};

use crate::api::types::{ChartItem, DashboardData, PerformanceData};

use super::count_of;

/// Where a [`DashboardSummary`] came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSource {
    /// Built from API responses.
    #[default]
    Live,
    /// Static demonstration data. Never produced in production builds.
    Demo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    /// `dd/mm`
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SenderShare {
    pub sender: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePhone {
    pub telefone: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAnalytics {
    pub avg_length: u64,
    pub min_length: u64,
    pub max_length: u64,
}

/// KPIs and chart series for the dashboard page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSummary {
    pub total_messages: u64,
    pub total_chats: u64,
    pub total_transbordos: u64,
    /// Not reported by the current API; always zero for live data.
    pub total_retries: u64,
    pub transbordo_rate: f64,
    pub success_rate: f64,
    pub avg_messages_per_chat: f64,
    pub messages_by_day: Vec<DailyCount>,
    /// Event-type distribution with localized labels.
    pub messages_by_sender: Vec<SenderShare>,
    /// Bank distribution, shown in the "active phones" panel.
    pub active_phones: Vec<ActivePhone>,
    pub message_analytics: MessageAnalytics,
    pub source: DataSource,
}

impl DashboardSummary {
    /// Demonstration figures for development builds.
    pub fn demo() -> Self {
        let day = |date: &str, count| DailyCount {
            date: date.to_string(),
            count,
        };
        let share = |sender: &str, count, percentage| SenderShare {
            sender: sender.to_string(),
            count,
            percentage,
        };
        let phone = |telefone: &str, count| ActivePhone {
            telefone: telefone.to_string(),
            count,
        };

        Self {
            total_messages: 26142,
            total_chats: 4876,
            total_transbordos: 9011,
            total_retries: 9504,
            transbordo_rate: 0.0,
            success_rate: 100.0 - 36.36,
            avg_messages_per_chat: 5.4,
            messages_by_day: vec![
                day("10/03", 3629),
                day("11/03", 10132),
                day("12/03", 12381),
            ],
            messages_by_sender: vec![
                share("Cliente", 13516, 51.8),
                share("Agente IA", 12574, 48.1),
                share("Bot", 16, 0.1),
            ],
            active_phones: vec![
                phone("MG (34) 98064-xxxx", 72),
                phone("SP (11) 95459-xxxx", 30),
                phone("SP (11) 99379-xxxx", 29),
                phone("RS (51) 81925-xxxx", 28),
                phone("SP (13) 99104-xxxx", 28),
            ],
            message_analytics: MessageAnalytics {
                avg_length: 103,
                min_length: 1,
                max_length: 973,
            },
            source: DataSource::Demo,
        }
    }

    pub const fn is_demo(&self) -> bool {
        matches!(self.source, DataSource::Demo)
    }
}

/// Renders an ISO date as `dd/mm`. Unparseable input is returned as is.
fn day_month(raw: &str) -> String {
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .ok()
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        });
    date.map_or_else(|| raw.to_string(), |d| d.format("%d/%m").to_string())
}

fn event_label(type_event: &str) -> &str {
    match type_event {
        "message" => "Mensagens",
        "transbordo" => "Transbordos",
        "consulta cpf" => "Consultas CPF",
        other => other,
    }
}

fn daily(items: &[ChartItem]) -> Vec<DailyCount> {
    items
        .iter()
        .map(|item| DailyCount {
            date: day_month(&item.date),
            count: count_of(&item.count),
        })
        .collect()
}

/// Builds the dashboard view model from whichever responses are available.
///
/// Anything missing stays at zero or empty. The success rate is only
/// derived when performance metrics are present.
pub fn format_dashboard(
    dashboard: Option<&DashboardData>,
    performance: Option<&PerformanceData>,
) -> DashboardSummary {
    let mut summary = DashboardSummary::default();

    if let Some(data) = dashboard {
        let totals = &data.totals;
        let charts = &data.charts;
        summary.total_messages = totals.messages;
        summary.total_chats = totals.chats;
        summary.total_transbordos = totals.transbordos;
        summary.messages_by_day = daily(&charts.messages_by_day);

        let total_events: u64 = charts
            .events_by_type
            .iter()
            .map(|item| count_of(&item.count))
            .sum();
        summary.messages_by_sender = charts
            .events_by_type
            .iter()
            .map(|item| {
                let count = count_of(&item.count);
                let percentage = if total_events > 0 {
                    count as f64 / total_events as f64 * 100.0
                } else {
                    0.0
                };
                SenderShare {
                    sender: event_label(&item.type_event).to_string(),
                    count,
                    percentage,
                }
            })
            .collect();

        summary.active_phones = charts
            .bank_distribution
            .iter()
            .map(|item| ActivePhone {
                telefone: item.bank.clone(),
                count: count_of(&item.count),
            })
            .collect();
    }

    if let Some(performance) = performance {
        let metrics = &performance.metrics;
        summary.transbordo_rate = metrics.transbordo_rate;
        summary.avg_messages_per_chat = metrics.avg_messages_per_chat;
        summary.success_rate = 100.0 - metrics.transbordo_rate;
    }

    summary
}

/// Shortens large figures: `1234` becomes `1.2k`.
pub fn format_stat(value: u64) -> String {
    if value >= 1000 {
        format!("{:.1}k", value as f64 / 1000.0)
    } else {
        value.to_string()
    }
}

/// Masks a phone as `UF (DDD) 12345-xxxx`.
///
/// Expects country code, area code and number as digits only. Anything
/// else is returned unchanged.
pub fn format_phone_number(phone: &str) -> String {
    if phone.len() < 5 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return phone.to_string();
    }
    let ddd = &phone[2..4];
    let number = &phone[4..];
    let visible = &number[..number.len().min(5)];
    match ddd {
        "11" => format!("SP ({ddd}) {visible}-xxxx"),
        "21" => format!("RJ ({ddd}) {visible}-xxxx"),
        "31" => format!("MG ({ddd}) {visible}-xxxx"),
        _ => format!("({ddd}) {visible}-xxxx"),
    }
}
