//! Named statistics computed over the hub state.

use crate::error::Result;
use crate::hub::HubState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Point {
    pub label: String,
    pub value: u64,
}

impl Point {
    fn new(label: impl Into<String>, value: usize) -> Self {
        Self {
            label: label.into(),
            value: value as u64,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StatisticResult {
    pub slug: &'static str,
    pub label: &'static str,
    pub series: Vec<Point>,
    pub computed_at: DateTime<Utc>,
}

pub struct Statistic {
    pub slug: &'static str,
    pub label: &'static str,
    func: fn(&HubState) -> Result<Vec<Point>>,
}

impl Statistic {
    pub fn execute(&self, state: &HubState) -> Result<StatisticResult> {
        Ok(StatisticResult {
            slug: self.slug,
            label: self.label,
            series: (self.func)(state)?,
            computed_at: Utc::now(),
        })
    }
}

/// Registry of available statistics.
pub struct Namespace {
    statistics: Vec<Statistic>,
}

impl Namespace {
    pub fn iter(&self) -> std::slice::Iter<'_, Statistic> {
        self.statistics.iter()
    }

    pub fn get(&self, slug: &str) -> Option<&Statistic> {
        self.statistics.iter().find(|s| s.slug == slug)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self {
            statistics: vec![
                Statistic {
                    slug: "total-tags",
                    label: "Total tags",
                    func: total_tags,
                },
                Statistic {
                    slug: "total-documents",
                    label: "Total documents",
                    func: total_documents,
                },
                Statistic {
                    slug: "tagged-documents",
                    label: "Documents with at least one tag",
                    func: tagged_documents,
                },
                Statistic {
                    slug: "untagged-documents",
                    label: "Documents without tags",
                    func: untagged_documents,
                },
                Statistic {
                    slug: "documents-per-tag",
                    label: "Documents per tag",
                    func: documents_per_tag,
                },
                Statistic {
                    slug: "new-tags-per-month",
                    label: "New tags per month",
                    func: new_tags_per_month,
                },
                Statistic {
                    slug: "new-documents-per-month",
                    label: "New documents per month",
                    func: new_documents_per_month,
                },
                Statistic {
                    slug: "events-per-verb",
                    label: "Recorded events per verb",
                    func: events_per_verb,
                },
            ],
        }
    }
}

fn total_tags(state: &HubState) -> Result<Vec<Point>> {
    Ok(vec![Point::new("tags", state.store.tag_count())])
}

fn total_documents(state: &HubState) -> Result<Vec<Point>> {
    Ok(vec![Point::new("documents", state.store.document_count())])
}

fn tagged_count(state: &HubState) -> usize {
    state
        .store
        .documents()
        .iter()
        .filter(|d| !state.store.document_tags(d.id).is_empty())
        .count()
}

fn tagged_documents(state: &HubState) -> Result<Vec<Point>> {
    Ok(vec![Point::new("documents", tagged_count(state))])
}

fn untagged_documents(state: &HubState) -> Result<Vec<Point>> {
    let untagged = state.store.document_count() - tagged_count(state);
    Ok(vec![Point::new("documents", untagged)])
}

// Labels are not unique, so each point carries the tag id too.
fn documents_per_tag(state: &HubState) -> Result<Vec<Point>> {
    Ok(state
        .store
        .tags()
        .into_iter()
        .map(|t| Point::new(format!("{} ({})", t.label, t.id), t.document_count()))
        .collect())
}

fn per_month(dates: impl Iterator<Item = DateTime<Utc>>) -> Vec<Point> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for date in dates {
        *months.entry(date.format("%Y-%m").to_string()).or_default() += 1;
    }
    months
        .into_iter()
        .map(|(month, n)| Point::new(month, n))
        .collect()
}

fn new_tags_per_month(state: &HubState) -> Result<Vec<Point>> {
    Ok(per_month(state.store.tags().into_iter().map(|t| t.created_at)))
}

fn new_documents_per_month(state: &HubState) -> Result<Vec<Point>> {
    Ok(per_month(
        state.store.documents().into_iter().map(|d| d.created_at),
    ))
}

fn events_per_verb(state: &HubState) -> Result<Vec<Point>> {
    let mut verbs = BTreeMap::new();
    for event in state.events.iter() {
        *verbs.entry(event.verb.as_str()).or_insert(0usize) += 1;
    }
    Ok(verbs
        .into_iter()
        .map(|(verb, n)| Point::new(verb, n))
        .collect())
}
