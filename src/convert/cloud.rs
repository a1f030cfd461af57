use super::{ConvertError, ConvertStrategy};
use reqwest::blocking::{multipart, Client};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Metafile conversion through the CloudConvert v2 REST API.
///
/// The job is a three-task pipeline: `import/upload`, `convert` to PNG,
/// and `export/url`. The result is downloaded from the exported URL.
pub struct CloudConvert {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl CloudConvert {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    fn create_job(&self, input_format: &str) -> Result<Value, ConvertError> {
        let body = json!({
            "tasks": {
                "import-upload": { "operation": "import/upload" },
                "convert": {
                    "operation": "convert",
                    "input": "import-upload",
                    "input_format": input_format,
                    "output_format": "png",
                },
                "export-url": { "operation": "export/url", "input": "convert" },
            }
        });
        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn upload(&self, job: &Value, input: &Path) -> Result<(), ConvertError> {
        let (url, parameters) = upload_form(job)
            .ok_or_else(|| ConvertError::Remote("job response missing upload task".into()))?;

        let mut form = multipart::Form::new();
        for (key, value) in parameters {
            form = form.text(key, value);
        }
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let part = multipart::Part::bytes(fs::read(input)?).file_name(file_name);
        form = form.part("file", part);

        self.client
            .post(url)
            .multipart(form)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn wait(&self, job_id: &str) -> Result<Value, ConvertError> {
        let started = Instant::now();
        loop {
            let job: Value = self
                .client
                .get(format!("{}/jobs/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key)
                .send()?
                .error_for_status()?
                .json()?;
            match job.pointer("/data/status").and_then(Value::as_str) {
                Some("finished") => return Ok(job),
                Some("error") => {
                    return Err(ConvertError::Remote(format!("job {} failed", job_id)));
                }
                _ => {}
            }
            if started.elapsed() > self.timeout {
                return Err(ConvertError::Timeout {
                    program: "cloudconvert".to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ConvertStrategy for CloudConvert {
    fn name(&self) -> &str {
        "cloudconvert"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let input_format = input
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let job = self.create_job(&input_format)?;
        let job_id = job
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| ConvertError::Remote("job response missing id".into()))?
            .to_string();
        self.upload(&job, input)?;

        let finished = self.wait(&job_id)?;
        let url = export_url(&finished).ok_or_else(|| {
            ConvertError::Remote(format!(
                "no export URL returned for {}",
                input.display()
            ))
        })?;

        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        fs::write(output, &bytes)?;
        Ok(())
    }
}

/// Finds a task of `job` by its pipeline name.
pub(crate) fn find_task<'a>(job: &'a Value, name: &str) -> Option<&'a Value> {
    job.pointer("/data/tasks")?
        .as_array()?
        .iter()
        .find(|task| task.get("name").and_then(Value::as_str) == Some(name))
}

/// Upload URL and form fields of the `import-upload` task.
pub(crate) fn upload_form(job: &Value) -> Option<(String, Vec<(String, String)>)> {
    let form = find_task(job, "import-upload")?.pointer("/result/form")?;
    let url = form.get("url")?.as_str()?.to_string();
    let parameters = form
        .get("parameters")
        .and_then(Value::as_object)
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();
    Some((url, parameters))
}

/// First file URL of the finished `export-url` task.
pub(crate) fn export_url(job: &Value) -> Option<String> {
    find_task(job, "export-url")?
        .pointer("/result/files/0/url")?
        .as_str()
        .map(str::to_string)
}
