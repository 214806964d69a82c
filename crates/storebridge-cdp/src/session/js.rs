//! JavaScript execution operations for CDP page session.

use std::time::Duration;

use serde_json::{Value, json};

use crate::client::COMMAND_TIMEOUT;
use crate::error::CdpError;
use crate::protocol::ExceptionDetails;

use super::core::PageSession;

/// Extra client-side wait beyond the in-page deadline.
const DEADLINE_GRACE: Duration = Duration::from_millis(500);

impl PageSession {
    /// Evaluate JavaScript expression in the page's default context.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        self.evaluate_with_timeout(expression, COMMAND_TIMEOUT).await
    }

    /// Evaluate with an explicit response timeout; promises are awaited.
    pub async fn evaluate_with_timeout(
        &self,
        expression: &str,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        let result = self
            .call_with_timeout(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
                timeout,
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let details: ExceptionDetails = serde_json::from_value(exception.clone())?;
            return Err(CdpError::JavaScript(details.message()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Wait until `expression` is truthy in the page.
    ///
    /// Issues one in-flight evaluation of a self-resuming polling promise, so
    /// the page does the polling rather than this client. If the context is
    /// replaced before the condition holds, the call fails with
    /// [`CdpError::ContextDestroyed`] and the caller re-arms in the new context.
    pub async fn wait_for_function(
        &self,
        expression: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), CdpError> {
        let script = polling_script(expression, poll_interval, timeout);
        let expired = || {
            CdpError::Timeout(format!(
                "condition not met within {}ms",
                timeout.as_millis()
            ))
        };
        // The page gives up at its own deadline; the grace only covers transit.
        match self
            .evaluate_with_timeout(&script, timeout + DEADLINE_GRACE)
            .await
        {
            Ok(Value::Bool(true)) => Ok(()),
            Ok(_) | Err(CdpError::Timeout(_)) => Err(expired()),
            Err(e) => Err(e),
        }
    }

    /// Run a script in the current document.
    pub async fn inject_script(&self, source: &str) -> Result<(), CdpError> {
        self.evaluate(source).await?;
        Ok(())
    }
}

/// Promise that resolves `true` once `expression` is truthy, re-checking every
/// `poll_interval`, or `false` once `timeout` has passed in the page.
pub(crate) fn polling_script(expression: &str, poll_interval: Duration, timeout: Duration) -> String {
    let poll = poll_interval.as_millis().max(1);
    let budget = timeout.as_millis();
    format!(
        r#"new Promise((resolve) => {{
    const deadline = Date.now() + {budget};
    const check = () => {{
        let ok = false;
        try {{ ok = !!({expression}); }} catch (e) {{ ok = false; }}
        if (ok) {{ resolve(true); return; }}
        if (Date.now() >= deadline) {{ resolve(false); return; }}
        setTimeout(check, {poll});
    }};
    check();
}})"#
    )
}
