//! Structural input validation
//!
//! Runs before any authorization work. Everything here depends only on the
//! request and the configuration, never on stored state.

use crate::config::OrchestratorConfig;
use crate::error::MutationError;
use crate::operation::{ActionInput, GoalInput, LinkInput, MetaRoadmapInput, MutationRequest, RoadmapInput};
use crate::types::DataSeries;
use once_cell::sync::Lazy;
use regex::Regex;

static LINK_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("link URL pattern is valid")
});

/// Validate a request's structure
///
/// # Errors
/// [`MutationError::InvalidInput`] naming the first offending field.
pub fn validate_request(
    request: &MutationRequest,
    config: &OrchestratorConfig,
) -> Result<(), MutationError> {
    match request {
        MutationRequest::CreateMetaRoadmap { input }
        | MutationRequest::UpdateMetaRoadmap { input, .. } => validate_meta_roadmap(input, config),
        MutationRequest::CreateRoadmap { input, .. }
        | MutationRequest::UpdateRoadmap { input, .. } => validate_roadmap(input, config),
        MutationRequest::CreateGoal { input, .. } | MutationRequest::UpdateGoal { input, .. } => {
            validate_goal(input, config).map(|_| ())
        }
        MutationRequest::CreateAction { input, .. }
        | MutationRequest::UpdateAction { input, .. } => validate_action(input, config),
        MutationRequest::CreateComment { text, .. } => {
            if text.trim().is_empty() {
                Err(MutationError::invalid("comment text is required"))
            } else {
                Ok(())
            }
        }
        MutationRequest::DeleteMetaRoadmap { .. }
        | MutationRequest::DeleteRoadmap { .. }
        | MutationRequest::DeleteGoal { .. }
        | MutationRequest::DeleteAction { .. } => Ok(()),
    }
}

fn validate_meta_roadmap(
    input: &MetaRoadmapInput,
    config: &OrchestratorConfig,
) -> Result<(), MutationError> {
    require_name("name", &input.name, config)?;
    validate_links(&input.links, config)
}

fn validate_roadmap(input: &RoadmapInput, config: &OrchestratorConfig) -> Result<(), MutationError> {
    if let Some(period) = &input.period {
        check_length("period", period, config)?;
    }
    for goal in &input.goals {
        validate_goal(goal, config)?;
    }
    Ok(())
}

/// Validate a goal and parse its data series
///
/// # Errors
/// [`MutationError::InvalidInput`] for missing indicator, unit or series, an
/// invalid series cell, or a bad link.
pub fn validate_goal(
    input: &GoalInput,
    config: &OrchestratorConfig,
) -> Result<DataSeries, MutationError> {
    require_name("indicator_parameter", &input.indicator_parameter, config)?;
    require_name("data_unit", &input.data_unit, config)?;
    if let Some(name) = &input.name {
        check_length("name", name, config)?;
    }
    validate_links(&input.links, config)?;
    parse_data_series(&input.data_unit, &input.data_series, config)
}

fn validate_action(input: &ActionInput, config: &OrchestratorConfig) -> Result<(), MutationError> {
    require_name("name", &input.name, config)?;
    if let (Some(start), Some(end)) = (input.start_year, input.end_year) {
        if start > end {
            return Err(MutationError::invalid(format!(
                "start_year {start} is after end_year {end}"
            )));
        }
    }
    validate_links(&input.links, config)
}

/// Parse yearly cells into a [`DataSeries`]
///
/// Cells are read from the configured first year onward; blank cells carry
/// no value. Values may use a decimal comma.
///
/// # Errors
/// [`MutationError::InvalidInput`] if the series is empty, longer than the
/// configured window, or holds a non-numeric cell.
pub fn parse_data_series(
    unit: &str,
    cells: &[String],
    config: &OrchestratorConfig,
) -> Result<DataSeries, MutationError> {
    if cells.is_empty() {
        return Err(MutationError::invalid("data_series is required"));
    }
    if cells.len() > config.series_len() {
        return Err(MutationError::invalid(format!(
            "data_series has {} cells, at most {} allowed",
            cells.len(),
            config.series_len()
        )));
    }

    let values = cells
        .iter()
        .enumerate()
        .map(|(offset, cell)| parse_cell(cell).ok_or_else(|| {
            MutationError::invalid(format!(
                "invalid data series value {cell:?} for year {}",
                usize::from(config.series_first_year) + offset
            ))
        }))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DataSeries {
        unit: unit.trim().to_string(),
        first_year: config.series_first_year,
        values,
    })
}

fn parse_cell(cell: &str) -> Option<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Some(None);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
}

fn validate_links(links: &[LinkInput], config: &OrchestratorConfig) -> Result<(), MutationError> {
    if links.len() > config.max_links_per_resource {
        return Err(MutationError::invalid(format!(
            "{} links given, at most {} allowed",
            links.len(),
            config.max_links_per_resource
        )));
    }
    for link in links {
        if !LINK_URL.is_match(link.url.trim()) {
            return Err(MutationError::invalid(format!("invalid link url {:?}", link.url)));
        }
    }
    Ok(())
}

fn require_name(field: &str, value: &str, config: &OrchestratorConfig) -> Result<(), MutationError> {
    if value.trim().is_empty() {
        return Err(MutationError::invalid(format!("{field} is required")));
    }
    check_length(field, value, config)
}

fn check_length(field: &str, value: &str, config: &OrchestratorConfig) -> Result<(), MutationError> {
    if value.chars().count() > config.max_name_length {
        return Err(MutationError::invalid(format!(
            "{field} exceeds {} characters",
            config.max_name_length
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(series: &[&str]) -> GoalInput {
        GoalInput {
            name: None,
            description: None,
            indicator_parameter: "Emissions|CO2|Transport".into(),
            data_unit: "kt CO2/yr".into(),
            data_series: series.iter().map(|s| (*s).to_string()).collect(),
            links: vec![],
        }
    }

    #[test]
    fn data_series_accepts_blanks_and_decimal_commas() {
        let config = OrchestratorConfig::default();
        let series = validate_goal(&goal(&["1", "", "2,5", " 3.25 "]), &config).unwrap();

        assert_eq!(series.first_year, 2020);
        assert_eq!(series.values, vec![Some(1.0), None, Some(2.5), Some(3.25)]);
    }

    #[test]
    fn data_series_rejects_garbage() {
        let config = OrchestratorConfig::default();
        let err = validate_goal(&goal(&["1", "abc"]), &config).unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(msg) if msg.contains("2021")));

        assert!(validate_goal(&goal(&["NaN"]), &config).is_err());
        assert!(validate_goal(&goal(&[]), &config).is_err());
    }

    #[test]
    fn data_series_respects_window() {
        let config = OrchestratorConfig::new().with_series_window(2020, 2022);
        assert!(validate_goal(&goal(&["1", "2", "3"]), &config).is_ok());
        assert!(validate_goal(&goal(&["1", "2", "3", "4"]), &config).is_err());
    }

    #[test]
    fn goal_requires_indicator_and_unit() {
        let config = OrchestratorConfig::default();
        let mut input = goal(&["1"]);
        input.indicator_parameter = "  ".into();
        assert!(validate_goal(&input, &config).is_err());

        let mut input = goal(&["1"]);
        input.data_unit = String::new();
        assert!(validate_goal(&input, &config).is_err());
    }

    #[test]
    fn links_must_be_http() {
        let config = OrchestratorConfig::default();
        let ok = LinkInput {
            url: "https://example.org/report.pdf".into(),
            description: None,
        };
        let bad = LinkInput {
            url: "javascript:alert(1)".into(),
            description: None,
        };

        assert!(validate_links(&[ok.clone()], &config).is_ok());
        assert!(validate_links(&[ok, bad], &config).is_err());
    }

    #[test]
    fn action_years_must_be_ordered() {
        let config = OrchestratorConfig::default();
        let mut action = ActionInput {
            name: "Expand rail".into(),
            description: None,
            start_year: Some(2030),
            end_year: Some(2025),
            links: vec![],
        };
        assert!(validate_action(&action, &config).is_err());

        action.end_year = Some(2035);
        assert!(validate_action(&action, &config).is_ok());
    }

    #[test]
    fn comment_text_is_required() {
        let config = OrchestratorConfig::default();
        let request = MutationRequest::CreateComment {
            target: crate::types::ResourceRef::Goal(crate::types::GoalId::new()),
            text: "   ".into(),
        };
        assert!(validate_request(&request, &config).is_err());
    }
}
