use url::Url;

/// Web app URL of a quiz: `{web_base_url}/quiz/{public_id}`.
pub fn quiz_link(web_base_url: &Url, public_id: &str) -> String {
    format!(
        "{}/quiz/{}",
        web_base_url.as_str().trim_end_matches('/'),
        public_id
    )
}
