//! What a caller asks a run to collect.

use socialetl_core::{Platform, SortOrder};
use socialetl_extract::{ExtractRequest, Target};

use crate::error::PipelineError;

/// A validated request for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub platform: Platform,
    pub target: Target,
    pub limit: usize,
    pub sort: Option<SortOrder>,
}

impl RunRequest {
    /// Build a request from loose caller input.
    ///
    /// Reddit takes either a subreddit or a search query (the subreddit wins
    /// when both are given). Every other platform needs a query, and only
    /// Reddit accepts a sort order. Blank strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] when the combination is not
    /// supported by `platform`.
    pub fn new(
        platform: Platform,
        query: Option<&str>,
        subreddit: Option<&str>,
        limit: usize,
        sort: Option<SortOrder>,
    ) -> Result<Self, PipelineError> {
        let query = non_blank(query);
        let subreddit = non_blank(subreddit).map(|s| s.trim_start_matches("r/").to_string());

        let target = match platform {
            Platform::Reddit => match (subreddit, query) {
                (Some(sub), _) => Target::Subreddit(sub),
                (None, Some(q)) => Target::Query(q.to_string()),
                (None, None) => {
                    return Err(PipelineError::InvalidRequest(
                        "reddit needs a target query or a subreddit".to_string(),
                    ))
                }
            },
            _ => {
                if subreddit.is_some() {
                    return Err(PipelineError::InvalidRequest(format!(
                        "--subreddit is only valid for reddit, not {platform}"
                    )));
                }
                let Some(q) = query else {
                    return Err(PipelineError::InvalidRequest(format!(
                        "{platform} needs a target query"
                    )));
                };
                Target::Query(q.to_string())
            }
        };

        if sort.is_some() && platform != Platform::Reddit {
            return Err(PipelineError::InvalidRequest(format!(
                "sort order is only supported for reddit, not {platform}"
            )));
        }

        Ok(Self {
            platform,
            target,
            limit,
            sort,
        })
    }

    pub(crate) fn extract_request(&self) -> ExtractRequest {
        ExtractRequest {
            target: self.target.clone(),
            limit: self.limit,
            sort: self.sort,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
