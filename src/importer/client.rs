use reqwest::blocking::Client;

use crate::importer::*;

/// Sends the import request to the backend over HTTP.
pub struct HttpImportBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpImportBackend {
    pub fn new(endpoint: &str, token: Option<String>) -> ImportResult<HttpImportBackend> {
        let client = Client::builder().build().context(HttpClientSnafu {})?;
        Ok(HttpImportBackend {
            client,
            endpoint: endpoint.to_string(),
            token,
        })
    }
}

impl ImportBackend for HttpImportBackend {
    fn import_voters(&self, request: &ImportRequest) -> Result<ImportSummary, BackendError> {
        info!(
            "import_voters: posting {} voters to {}",
            request.students.len(),
            self.endpoint
        );
        let mut builder = self.client.post(self.endpoint.as_str()).json(request);
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().map_err(|e| BackendError::Transport {
            message: e.to_string(),
        })?;
        let status = response.status();
        debug!("import_voters: status {}", status);
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<ImportSummary>()
            .map_err(|e| BackendError::Transport {
                message: format!("unexpected response: {}", e),
            })
    }
}
