//! Selección de vista a partir de los parámetros de la URL
//! (`?app=`, `?search=`, `?category=`, `?tab=`).

use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum View {
    Home,
    Solution { id: String },
    Search { query: String },
    Category { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRequest {
    #[serde(flatten)]
    pub view: View,
    pub tab: Option<String>,
}

impl ViewRequest {
    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Acepta la cadena de consulta con o sin el `?` inicial.
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()));
        Self::from_pairs(pairs)
    }

    fn from_pairs(pairs: impl Iterator<Item = (String, String)>) -> Self {
        let (mut app, mut search, mut category, mut tab) = (None, None, None, None);
        for (key, value) in pairs {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_str() {
                "app" => &mut app,
                "search" => &mut search,
                "category" => &mut category,
                "tab" => &mut tab,
                _ => continue,
            };
            slot.get_or_insert(value);
        }

        let view = match (app, search, category) {
            (Some(id), _, _) => View::Solution { id },
            (None, Some(query), _) => View::Search { query },
            (None, None, Some(id)) => View::Category { id },
            (None, None, None) => View::Home,
        };
        Self { view, tab }
    }
}
