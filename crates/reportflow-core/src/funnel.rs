//! Conversion funnel derived from the event-count list. Issues no API calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::Record;
use crate::registry::{dims, metrics};

/// Stage counts and step ratios. A ratio is absent when its denominator is 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelRecord {
    pub page_views: f64,
    pub scrolls: f64,
    pub form_starts: f64,
    pub form_submits: f64,
    pub purchases: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_rate: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

/// Count for the exact event name; later duplicates win.
fn event_count(events: &[Record], name: &str) -> f64 {
    events
        .iter()
        .rev()
        .find(|event| event.get(dims::EVENT).and_then(Value::as_str) == Some(name))
        .and_then(|event| event.get(metrics::EVENT_COUNT))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

pub fn derive_funnel(events: &[Record]) -> FunnelRecord {
    let page_views = event_count(events, "page_view");
    let scrolls = event_count(events, "scroll");
    let form_starts = event_count(events, "form_start");
    let form_submits = event_count(events, "form_submit");
    let purchases = event_count(events, "purchase");

    FunnelRecord {
        page_views,
        scrolls,
        form_starts,
        form_submits,
        purchases,
        scroll_rate: ratio(scrolls, page_views),
        form_rate: ratio(form_starts, page_views),
        submit_rate: ratio(form_submits, form_starts),
        purchase_rate: ratio(purchases, form_submits),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn events(pairs: &[(&str, f64)]) -> Vec<Record> {
        pairs
            .iter()
            .map(|(name, count)| {
                let mut record = Record::new();
                record.insert("eventName".to_string(), json!(name));
                record.insert("eventCount".to_string(), json!(count));
                record
            })
            .collect()
    }

    #[test]
    fn ratios_follow_the_stage_order() {
        let funnel = derive_funnel(&events(&[
            ("page_view", 1000.0),
            ("scroll", 400.0),
            ("form_start", 50.0),
            ("form_submit", 20.0),
            ("purchase", 5.0),
            ("click", 77.0),
        ]));
        assert_eq!(funnel.scroll_rate, Some(0.4));
        assert_eq!(funnel.form_rate, Some(0.05));
        assert_eq!(funnel.submit_rate, Some(0.4));
        assert_eq!(funnel.purchase_rate, Some(0.25));
    }

    #[test]
    fn zero_denominators_omit_the_ratio() {
        let funnel = derive_funnel(&events(&[("page_view", 10.0), ("scroll", 3.0)]));
        assert_eq!(funnel.form_starts, 0.0);
        assert!(funnel.submit_rate.is_none());
        assert!(funnel.purchase_rate.is_none());

        let value = serde_json::to_value(&funnel).unwrap();
        assert!(value.get("submit_rate").is_none());
        assert!(value.get("purchase_rate").is_none());
        assert_eq!(value["scroll_rate"], json!(0.3));
    }

    #[test]
    fn empty_events_yield_zero_counts_and_no_ratios() {
        let funnel = derive_funnel(&[]);
        assert_eq!(funnel, FunnelRecord::default());
        assert_eq!(
            serde_json::to_value(&funnel).unwrap(),
            json!({"page_views": 0.0, "scrolls": 0.0, "form_starts": 0.0, "form_submits": 0.0, "purchases": 0.0})
        );
    }
}
