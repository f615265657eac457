//! # Event Coordinator
//!
//! Combines the events of several calendars into one timeline. The same
//! meeting often appears in more than one calendar (an invite accepted in a
//! work calendar and mirrored into a personal one), so the coordinator:
//!
//! 1. orders events by provider priority, so the preferred source comes first
//! 2. groups likely duplicates (same id, or similar titles starting within the
//!    deduplication window) and merges each group into one event
//! 3. returns the result ordered by start time
//!
//! Coordination is synchronous and never modifies its input.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::similarity::titles_similar;
use crate::constants::{DEFAULT_MERGE_STRATEGY_KEY, MERGED_ID_PREFIX};
use crate::models::{Alarm, Event};

/// How alarms are combined when duplicate events are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Alarms of the highest-priority event
    #[default]
    KeepFirst,
    /// Alarms of the lowest-priority event
    KeepLast,
    /// Union of all alarms, longest lead first
    MergeAlarms,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::KeepFirst => "keep_first",
            MergeStrategy::KeepLast => "keep_last",
            MergeStrategy::MergeAlarms => "merge_alarms",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_first" => Ok(MergeStrategy::KeepFirst),
            "keep_last" => Ok(MergeStrategy::KeepLast),
            "merge_alarms" => Ok(MergeStrategy::MergeAlarms),
            other => Err(format!(
                "unknown merge strategy '{other}' (expected keep_first, keep_last or merge_alarms)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub deduplication_enabled: bool,

    /// Maximum start time difference for two events to count as duplicates
    pub deduplication_window: Duration,

    /// Rank per lower-cased calendar name, lower ranks win
    pub provider_priorities: HashMap<String, i32>,

    /// Strategy per name; only the `default` entry is consulted when merging
    pub merge_strategies: HashMap<String, MergeStrategy>,
}

impl CoordinatorConfig {
    /// Strategy used for merging duplicate groups
    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategies
            .get(DEFAULT_MERGE_STRATEGY_KEY)
            .copied()
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.deduplication_enabled && self.deduplication_window > Duration::from_secs(24 * 3600)
        {
            return Err("deduplication_window should not exceed 24 hours".to_string());
        }

        if let Some(name) = self
            .provider_priorities
            .keys()
            .find(|name| name.to_lowercase() != **name)
        {
            return Err(format!(
                "provider priority key '{name}' must be lower-case to ever match"
            ));
        }

        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            deduplication_enabled: true,
            deduplication_window: Duration::from_secs(5 * 60),
            provider_priorities: HashMap::from([
                ("google".to_string(), 1),
                ("outlook".to_string(), 2),
                ("apple".to_string(), 3),
            ]),
            merge_strategies: HashMap::from([
                (DEFAULT_MERGE_STRATEGY_KEY.to_string(), MergeStrategy::KeepFirst),
                ("alarms".to_string(), MergeStrategy::MergeAlarms),
            ]),
        }
    }
}

/// Summary of one coordination pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationStats {
    pub original_count: usize,
    pub coordinated_count: usize,
    pub duplicates_removed: usize,
    /// Coordinated events per calendar name
    pub provider_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct EventCoordinator {
    config: CoordinatorConfig,
}

impl EventCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CoordinatorConfig) {
        self.config = config;
    }

    /// Deduplicate, merge and order a batch of events from all calendars
    pub fn coordinate_events(&self, events: &[Event]) -> Vec<Event> {
        if events.is_empty() {
            return Vec::new();
        }

        debug!(input_count = events.len(), "Coordinating events");

        let mut prioritized: Vec<&Event> = events.iter().collect();
        prioritized.sort_by(|a, b| self.compare_priority(a, b));

        let mut coordinated = if self.config.deduplication_enabled {
            self.deduplicate(&prioritized)
        } else {
            prioritized.into_iter().cloned().collect()
        };

        coordinated.sort_by_key(|event| event.start_time);

        info!(
            input_count = events.len(),
            output_count = coordinated.len(),
            duplicates_removed = events.len().saturating_sub(coordinated.len()),
            "Event coordination complete"
        );

        coordinated
    }

    pub fn coordination_stats(&self, original: &[Event], coordinated: &[Event]) -> CoordinationStats {
        let mut provider_counts = HashMap::new();
        for event in coordinated {
            *provider_counts.entry(event.calendar_name.clone()).or_insert(0) += 1;
        }

        CoordinationStats {
            original_count: original.len(),
            coordinated_count: coordinated.len(),
            duplicates_removed: original.len().saturating_sub(coordinated.len()),
            provider_counts,
        }
    }

    fn rank(&self, event: &Event) -> Option<i32> {
        self.config
            .provider_priorities
            .get(&event.calendar_name.to_lowercase())
            .copied()
    }

    /// Ranked calendars first by rank, then unranked ones by name
    fn compare_priority(&self, a: &Event, b: &Event) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(rank_a), Some(rank_b)) => rank_a.cmp(&rank_b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a
                .calendar_name
                .to_lowercase()
                .cmp(&b.calendar_name.to_lowercase()),
        }
    }

    fn deduplicate(&self, prioritized: &[&Event]) -> Vec<Event> {
        let mut processed = vec![false; prioritized.len()];
        let mut result = Vec::with_capacity(prioritized.len());

        for (index, &anchor) in prioritized.iter().enumerate() {
            if processed[index] {
                continue;
            }
            processed[index] = true;

            let mut group = vec![anchor];
            for (other_index, &candidate) in prioritized.iter().enumerate().skip(index + 1) {
                if !processed[other_index] && self.is_duplicate(anchor, candidate) {
                    processed[other_index] = true;
                    group.push(candidate);
                }
            }

            if group.len() == 1 {
                result.push(anchor.clone());
            } else {
                let merged = self.merge_group(&group);
                debug!(
                    primary_event = %anchor.id,
                    total_duplicates = group.len(),
                    merged_id = %merged.id,
                    merged_title = %merged.title,
                    "Merged duplicate events"
                );
                result.push(merged);
            }
        }

        result
    }

    fn is_duplicate(&self, a: &Event, b: &Event) -> bool {
        if a.id == b.id {
            return true;
        }

        let diff = (a.start_time - b.start_time).abs();
        let within_window = diff
            .to_std()
            .map_or(false, |diff| diff <= self.config.deduplication_window);

        within_window && titles_similar(&a.title, &b.title)
    }

    fn merge_group(&self, group: &[&Event]) -> Event {
        let base = group[0];
        let mut merged = base.clone();
        // A merged event stands for several sources, none of whose RSVP applies
        merged.response_status = None;

        merged.alarms = match self.config.merge_strategy() {
            MergeStrategy::KeepFirst => base.alarms.clone(),
            MergeStrategy::KeepLast => group[group.len() - 1].alarms.clone(),
            MergeStrategy::MergeAlarms => merge_alarms(group),
        };

        for event in group {
            if merged.description.is_empty() && !event.description.is_empty() {
                merged.description = event.description.clone();
            }
            if merged.location.is_empty() && !event.location.is_empty() {
                merged.location = event.location.clone();
            }
        }

        merged.modified_at = group
            .iter()
            .map(|event| event.modified_at)
            .max()
            .unwrap_or(base.modified_at);

        let ids: Vec<&str> = group.iter().map(|event| event.id.as_str()).collect();
        merged.id = format!("{MERGED_ID_PREFIX}{}", ids.join("-"));

        merged
    }
}

/// Union of the group's alarms without duplicate triples, longest lead first
fn merge_alarms(group: &[&Event]) -> Vec<Alarm> {
    let mut seen = HashSet::new();
    let mut alarms: Vec<Alarm> = group
        .iter()
        .flat_map(|event| event.alarms.iter())
        .filter(|alarm| seen.insert(*alarm))
        .cloned()
        .collect();

    alarms.sort_by(|a, b| b.lead_time_minutes.cmp(&a.lead_time_minutes));
    alarms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseStatus;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, offset_minutes: i64, calendar: &str) -> Event {
        let start = base_time() + ChronoDuration::minutes(offset_minutes);
        Event::new(id, title, start, start + ChronoDuration::hours(1)).with_calendar(calendar, calendar)
    }

    fn config(strategy: MergeStrategy) -> CoordinatorConfig {
        CoordinatorConfig {
            deduplication_enabled: true,
            deduplication_window: Duration::from_secs(5 * 60),
            provider_priorities: HashMap::from([
                ("caldav".to_string(), 1),
                ("outlook".to_string(), 2),
            ]),
            merge_strategies: HashMap::from([("default".to_string(), strategy)]),
        }
    }

    fn team_meeting_pair() -> Vec<Event> {
        vec![
            event("B", "Team Meeting", 62, "outlook")
                .with_alarm(Alarm::new(10, "email", "high"))
                .with_alarm(Alarm::new(15, "popup", "normal")),
            event("A", "Team Meeting", 60, "caldav").with_alarm(Alarm::new(15, "popup", "normal")),
        ]
    }

    #[test]
    fn test_empty_input() {
        let coordinator = EventCoordinator::default();
        assert!(coordinator.coordinate_events(&[]).is_empty());
    }

    #[test]
    fn test_keep_first_merges_into_priority_source() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let result = coordinator.coordinate_events(&team_meeting_pair());

        assert_eq!(result.len(), 1);
        let merged = &result[0];
        assert_eq!(merged.id, "merged-A-B");
        assert_eq!(merged.calendar_name, "caldav");
        assert_eq!(merged.alarms, vec![Alarm::new(15, "popup", "normal")]);
    }

    #[test]
    fn test_merge_alarms_unions_and_sorts() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::MergeAlarms));
        let result = coordinator.coordinate_events(&team_meeting_pair());

        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].alarms,
            vec![
                Alarm::new(15, "popup", "normal"),
                Alarm::new(10, "email", "high"),
            ]
        );
    }

    #[test]
    fn test_keep_last_uses_lowest_priority_alarms() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepLast));
        let result = coordinator.coordinate_events(&team_meeting_pair());

        assert_eq!(result[0].alarms.len(), 2);
        assert_eq!(result[0].alarms[0].method, "email");
    }

    #[test]
    fn test_merged_event_drops_response_status() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let events = vec![
            event("A", "Team Meeting", 60, "caldav").with_response_status(ResponseStatus::Declined),
            event("B", "Team Meeting", 61, "outlook").with_response_status(ResponseStatus::Accepted),
            event("C", "Dentist", 180, "caldav").with_response_status(ResponseStatus::Tentative),
        ];

        let result = coordinator.coordinate_events(&events);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "merged-A-B");
        assert_eq!(result[0].response_status, None);
        assert!(result[0].is_accepted());
        assert_eq!(result[1].response_status, Some(ResponseStatus::Tentative));
    }

    #[test]
    fn test_input_is_not_modified() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::MergeAlarms));
        let input = team_meeting_pair();
        let snapshot = input.clone();

        let _ = coordinator.coordinate_events(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_events_outside_window_are_kept_apart() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let events = vec![
            event("A", "Team Meeting", 0, "caldav"),
            event("B", "Team Meeting", 6, "outlook"),
        ];

        let result = coordinator.coordinate_events(&events);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "A");
        assert_eq!(result[1].id, "B");
    }

    #[test]
    fn test_same_id_always_merges() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let events = vec![
            event("X", "Planning", 0, "caldav"),
            event("X", "Completely different", 600, "outlook"),
        ];

        let result = coordinator.coordinate_events(&events);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "merged-X-X");
    }

    #[test]
    fn test_deduplication_disabled_only_sorts() {
        let mut cfg = config(MergeStrategy::KeepFirst);
        cfg.deduplication_enabled = false;
        let coordinator = EventCoordinator::new(cfg);

        let result = coordinator.coordinate_events(&team_meeting_pair());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "A");
        assert_eq!(result[1].id, "B");
    }

    #[test]
    fn test_field_backfill_and_latest_modification() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let later = base_time() + ChronoDuration::days(1);
        let events = vec![
            event("A", "Roadmap review", 0, "caldav"),
            event("B", "Roadmap review", 1, "outlook")
                .with_description("Q3 roadmap")
                .with_location("Room 4")
                .with_modified_at(later),
        ];

        let merged = &coordinator.coordinate_events(&events)[0];
        assert_eq!(merged.description, "Q3 roadmap");
        assert_eq!(merged.location, "Room 4");
        assert_eq!(merged.modified_at, later);
        assert_eq!(merged.start_time, events[0].start_time);
    }

    #[test]
    fn test_priority_ordering_with_unranked_calendars() {
        let mut cfg = config(MergeStrategy::KeepFirst);
        cfg.deduplication_enabled = false;
        let coordinator = EventCoordinator::new(cfg);

        let events = vec![
            event("z", "Zeta", 0, "zoo"),
            event("o", "Omega", 0, "Outlook"),
            event("a", "Alpha", 0, "apple"),
            event("c", "Gamma", 0, "caldav"),
        ];

        let mut prioritized: Vec<&Event> = events.iter().collect();
        prioritized.sort_by(|a, b| coordinator.compare_priority(a, b));
        let order: Vec<&str> = prioritized.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["c", "o", "a", "z"]);
    }

    #[test]
    fn test_coordination_stats() {
        let coordinator = EventCoordinator::new(config(MergeStrategy::KeepFirst));
        let mut original = team_meeting_pair();
        original.push(event("C", "Dentist", 300, "personal"));

        let coordinated = coordinator.coordinate_events(&original);
        let stats = coordinator.coordination_stats(&original, &coordinated);

        assert_eq!(stats.original_count, 3);
        assert_eq!(stats.coordinated_count, 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.provider_counts.get("caldav"), Some(&1));
        assert_eq!(stats.provider_counts.get("personal"), Some(&1));
        assert_eq!(stats.provider_counts.get("outlook"), None);
    }

    #[test]
    fn test_merge_strategy_parsing() {
        assert_eq!(
            "merge_alarms".parse::<MergeStrategy>(),
            Ok(MergeStrategy::MergeAlarms)
        );
        assert!("newest".parse::<MergeStrategy>().is_err());
        assert_eq!(CoordinatorConfig::default().merge_strategy(), MergeStrategy::KeepFirst);
    }
}
