use crate::service::codeforces::MetadataProvider;
use crate::storage::note::NoteMetadata;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use url::Url;

const CODEFORCES_HOST: &str = "codeforces.com";

static CONTEST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/contest/(\d+)/problem/([a-z0-9]+)/?$").unwrap());
static PROBLEMSET_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/problemset/problem/(\d+)/([a-z0-9]+)/?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRef {
    pub contest_id: String,
    pub index: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemMetadata {
    pub name: String,
    pub rating: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub contest_id: String,
    pub index: String,
}

/// Outcome of a lookup. Unresolved is a normal result, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ProblemMetadata),
    Unresolved,
}

impl Resolution {
    /// Metadata group to store for `link`.
    pub fn into_metadata(self, link: &str) -> NoteMetadata {
        match self {
            Resolution::Resolved(meta) => NoteMetadata {
                name: Some(meta.name),
                rating: meta.rating,
                tags: meta.tags,
                contest_id: Some(meta.contest_id),
                index: Some(meta.index),
            },
            Resolution::Unresolved => NoteMetadata::unresolved(link),
        }
    }
}

/// Parse a problem link into contest id and problem index.
pub fn parse_problem_url(link: &str) -> Option<ProblemRef> {
    let url = Url::parse(link.trim()).ok()?;
    if url.host_str()? != CODEFORCES_HOST {
        return None;
    }

    [&*CONTEST_PATH, &*PROBLEMSET_PATH].iter().find_map(|re| {
        re.captures(url.path()).map(|caps| ProblemRef {
            contest_id: caps[1].to_string(),
            index: caps[2].to_string(),
        })
    })
}

#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn MetadataProvider>,
}

impl Resolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Resolver { provider }
    }

    /// Best-effort metadata lookup for a link. Never fails: bad links,
    /// network errors and unknown problems all come back `Unresolved`.
    pub async fn resolve(&self, link: &str) -> Resolution {
        let Some(problem) = parse_problem_url(link) else {
            tracing::debug!(link, "link is not a known problem url");
            return Resolution::Unresolved;
        };

        let problems = match self.provider.contest_problems(&problem.contest_id).await {
            Ok(problems) => problems,
            Err(e) => {
                tracing::warn!(contest_id = %problem.contest_id, error = %e, "metadata lookup failed");
                return Resolution::Unresolved;
            }
        };

        match problems
            .into_iter()
            .find(|p| p.index.eq_ignore_ascii_case(&problem.index))
        {
            Some(found) => {
                tracing::debug!(contest_id = %problem.contest_id, index = %problem.index, name = %found.name, "resolved problem");
                Resolution::Resolved(ProblemMetadata {
                    name: found.name,
                    rating: found.rating,
                    tags: found.tags,
                    contest_id: problem.contest_id,
                    index: problem.index,
                })
            }
            None => {
                tracing::warn!(contest_id = %problem.contest_id, index = %problem.index, "problem not in contest roster");
                Resolution::Unresolved
            }
        }
    }
}
