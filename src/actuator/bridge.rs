use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actuator::actuator::{FillActuator, FillFailure};
use crate::form::form_model::{FormField, SelectOption};

// ============================================================================
// HTTP bridge actuator
// ============================================================================
//
// Talks to a local browser driver (the process actually holding the page)
// over a one-command-per-request JSON protocol: `{action, selector, ...}` in,
// `{success, error, options?}` out.

/// Command sent to the browser driver.
#[derive(Debug, Serialize)]
struct DriverCommand<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    listbox: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

impl<'a> DriverCommand<'a> {
    fn new(action: &'static str) -> DriverCommand<'a> {
        DriverCommand {
            action,
            selector: None,
            value: None,
            listbox: None,
            timeout_ms: None,
        }
    }
}

/// Response from the browser driver.
#[derive(Debug, Deserialize)]
struct DriverResult {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    options: Vec<SelectOption>,
}

pub struct BridgeActuator {
    endpoint: String,
    combobox_open_timeout_ms: u64,
    client: reqwest::Client,
}

impl BridgeActuator {
    pub fn new(endpoint: &str, combobox_open_timeout_ms: u64) -> BridgeActuator {
        BridgeActuator {
            endpoint: endpoint.to_string(),
            combobox_open_timeout_ms,
            client: reqwest::Client::new(),
        }
    }

    async fn execute(&self, command: DriverCommand<'_>) -> Result<DriverResult, FillFailure> {
        debug!(action = command.action, selector = ?command.selector, "driver command");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&command)
            .send()
            .await
            .map_err(|e| FillFailure::Driver(e.to_string()))?;
        response
            .json::<DriverResult>()
            .await
            .map_err(|e| FillFailure::Driver(e.to_string()))
    }

    /// Run a command and map a `success: false` reply onto a failure.
    async fn execute_ok(
        &self,
        command: DriverCommand<'_>,
        on_failure: impl Fn(String) -> FillFailure,
    ) -> Result<(), FillFailure> {
        let result = self.execute(command).await?;
        if result.success {
            Ok(())
        } else {
            Err(on_failure(result.error.unwrap_or_default()))
        }
    }
}

#[async_trait]
impl FillActuator for BridgeActuator {
    async fn fill_text(&self, field: &FormField, value: &str) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("fill");
        cmd.selector = Some(&field.selector);
        cmd.value = Some(value);
        self.execute_ok(cmd, FillFailure::Rejected).await
    }

    async fn select_native(
        &self,
        field: &FormField,
        option_value: &str,
    ) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("select");
        cmd.selector = Some(&field.selector);
        cmd.value = Some(option_value);
        self.execute_ok(cmd, FillFailure::Rejected).await
    }

    async fn set_checked(&self, field: &FormField, checked: bool) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new(if checked { "check" } else { "uncheck" });
        cmd.selector = Some(&field.selector);
        self.execute_ok(cmd, FillFailure::Rejected).await
    }

    async fn check_radio(&self, field: &FormField, value: &str) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("check_radio");
        cmd.selector = Some(&field.selector);
        cmd.value = Some(value);
        self.execute_ok(cmd, FillFailure::Rejected).await
    }

    async fn upload_file(&self, field: &FormField, path: &str) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("upload");
        cmd.selector = Some(&field.selector);
        cmd.value = Some(path);
        self.execute_ok(cmd, FillFailure::UploadTargetMissing).await
    }

    async fn trigger_action(&self, locator: &str) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("click");
        cmd.selector = Some(locator);
        self.execute_ok(cmd, FillFailure::ActionFailed).await
    }

    async fn open_combobox(&self, field: &FormField) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("open_combobox");
        cmd.selector = Some(&field.selector);
        cmd.listbox = field.listbox_locator.as_deref();
        cmd.timeout_ms = Some(self.combobox_open_timeout_ms);
        self.execute_ok(cmd, |_| FillFailure::TimeoutWaitingForListbox)
            .await
    }

    async fn read_combobox_options(
        &self,
        field: &FormField,
    ) -> Result<Vec<SelectOption>, FillFailure> {
        let mut cmd = DriverCommand::new("read_options");
        cmd.selector = Some(&field.selector);
        cmd.listbox = field.listbox_locator.as_deref();
        let result = self.execute(cmd).await?;
        if result.success {
            Ok(result.options)
        } else {
            Err(FillFailure::Driver(result.error.unwrap_or_default()))
        }
    }

    async fn click_combobox_option(
        &self,
        field: &FormField,
        option: &SelectOption,
    ) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("click_option");
        cmd.selector = Some(&field.selector);
        cmd.listbox = field.listbox_locator.as_deref();
        cmd.value = Some(&option.value);
        self.execute_ok(cmd, |_| FillFailure::OptionClickFailed).await
    }

    async fn close_combobox(&self, field: &FormField) -> Result<(), FillFailure> {
        let mut cmd = DriverCommand::new("close_combobox");
        cmd.selector = Some(&field.selector);
        self.execute_ok(cmd, FillFailure::Driver).await
    }
}
