//! Moodle web service client.
//!
//! Every call is a form-encoded POST to `/webservice/rest/server.php`; the
//! server-side function is picked with `wsfunction`. Transport and decoding
//! failures collapse into an empty JSON object, so callers treat missing
//! data as "nothing there" rather than as a distinct error.

use colored::*;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::{API_ENDPOINT, VERSION};

pub const FN_SITE_INFO: &str = "core_webservice_get_site_info";
pub const FN_USER_COURSES: &str = "core_enrol_get_users_courses";
pub const FN_COURSE_CONTENTS: &str = "core_course_get_contents";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteInfo {
    pub userid: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub sitename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub id: u64,
    pub fullname: String,
    #[serde(default)]
    pub shortname: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modname: String,
    #[serde(default)]
    pub contents: Vec<FileContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub fileurl: String,
    #[serde(default)]
    pub filesize: u64,
}

impl FileContent {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// The three web service functions the sync needs
pub trait MoodleApi {
    fn site_info(&self) -> Result<SiteInfo, ApiError>;
    fn user_courses(&self, userid: u64) -> Vec<Course>;
    fn course_contents(&self, course_id: u64) -> Vec<Section>;
}

pub struct ApiClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(format!("moodle-sync/{VERSION}"))
            .build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), API_ENDPOINT),
            token: token.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call a web service function; `{}` on any failure
    pub fn call(&self, function: &str, params: &[(&str, String)]) -> Value {
        let mut form: Vec<(&str, String)> = vec![
            ("wstoken", self.token.clone()),
            ("wsfunction", function.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        form.extend(params.iter().cloned());

        debug!(function, "calling Moodle web service");

        let result = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .and_then(|response| response.json::<Value>());

        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(function, error = %e, "web service call failed");
                println!("{} API Error: {}", "⚠️".yellow(), e);
                Value::Object(Map::new())
            }
        }
    }

    /// Decode a list answer, treating exceptions and odd shapes as empty
    fn call_list<T: DeserializeOwned>(&self, function: &str, params: &[(&str, String)]) -> Vec<T> {
        let value = self.call(function, params);
        if let Some(err) = remote_error(&value) {
            warn!(function, error = %err, "Moodle returned an exception");
            println!("{} {}: {}", "⚠️".yellow(), function, err);
            return Vec::new();
        }
        decode_list(value, function)
    }
}

impl MoodleApi for ApiClient {
    fn site_info(&self) -> Result<SiteInfo, ApiError> {
        let value = self.call(FN_SITE_INFO, &[]);
        if let Some(err) = remote_error(&value) {
            return Err(err);
        }
        serde_json::from_value(value).map_err(|e| {
            debug!(error = %e, "site info did not decode");
            ApiError::Empty {
                function: FN_SITE_INFO.to_string(),
            }
        })
    }

    fn user_courses(&self, userid: u64) -> Vec<Course> {
        self.call_list(FN_USER_COURSES, &[("userid", userid.to_string())])
    }

    fn course_contents(&self, course_id: u64) -> Vec<Section> {
        self.call_list(FN_COURSE_CONTENTS, &[("courseid", course_id.to_string())])
    }
}

/// Moodle reports failures as `{"exception": ..., "errorcode": ..., "message": ...}`
pub fn remote_error(value: &Value) -> Option<ApiError> {
    let object = value.as_object()?;
    object.get("exception")?;

    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(ApiError::Remote {
        errorcode: field("errorcode"),
        message: field("message"),
    })
}

/// Decode a JSON array, or return an empty list for anything else
pub fn decode_list<T: DeserializeOwned>(value: Value, function: &str) -> Vec<T> {
    if !value.is_array() {
        debug!(function, "response is not a list");
        return Vec::new();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(function, error = %e, "could not decode response");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_moodle_exceptions() {
        let value = json!({
            "exception": "moodle_exception",
            "errorcode": "invalidtoken",
            "message": "Invalid token - token not found"
        });
        match remote_error(&value) {
            Some(ApiError::Remote { errorcode, message }) => {
                assert_eq!(errorcode, "invalidtoken");
                assert_eq!(message, "Invalid token - token not found");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(remote_error(&json!({"userid": 3})).is_none());
        assert!(remote_error(&json!([])).is_none());
    }

    #[test]
    fn decodes_course_contents_with_missing_fields() {
        let value = json!([
            {
                "name": "Aulas Teóricas",
                "modules": [
                    {"name": "Slides", "modname": "resource", "contents": [
                        {"type": "file", "filename": "T1.pdf", "fileurl": "https://m/pluginfile.php/1/T1.pdf?forcedownload=1", "filesize": 10}
                    ]},
                    {"name": "Fórum", "modname": "forum"}
                ]
            },
            {"modules": []}
        ]);
        let sections: Vec<Section> = decode_list(value, FN_COURSE_CONTENTS);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].modules[0].contents[0].filename, "T1.pdf");
        assert!(sections[0].modules[0].contents[0].is_file());
        assert!(sections[0].modules[1].contents.is_empty());
        assert_eq!(sections[1].name, "");
    }

    #[test]
    fn non_list_answers_decode_to_empty() {
        let courses: Vec<Course> = decode_list(json!({}), FN_USER_COURSES);
        assert!(courses.is_empty());
        let courses: Vec<Course> = decode_list(json!([{"bogus": true}]), FN_USER_COURSES);
        assert!(courses.is_empty());
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let client = ApiClient::with_client(Client::new(), "https://moodle.example.org/", "t");
        assert_eq!(
            client.endpoint(),
            "https://moodle.example.org/webservice/rest/server.php"
        );
    }
}
