//! Automation-signal suppression.
//!
//! Challenge pages fingerprint the browser before releasing content; a
//! default headless Chromium fails several of those probes. These scripts
//! are installed before any page script runs and patch the obvious
//! signals. Best-effort: a site determined to detect automation still can.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;

/// Evasion scripts, applied in order on every new document.
const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is the first thing every challenge checks
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // chromedriver leftovers
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
    r#"
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(parameter) {
        if (parameter === 37445) {
            return 'Intel Inc.';
        }
        if (parameter === 37446) {
            return 'Intel Iris OpenGL Engine';
        }
        return getParameter.call(this, parameter);
    };
    "#,
];

/// Install every evasion script on the page, pre-navigation.
pub(crate) async fn install(page: &Page) -> Result<(), CdpError> {
    for script in STEALTH_SCRIPTS {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(*script)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_patch_the_known_signals() {
        let combined = STEALTH_SCRIPTS.concat();
        assert!(combined.contains("webdriver"));
        assert!(combined.contains("window.chrome"));
        assert!(combined.contains("plugins"));
        assert!(combined.contains("languages"));
    }
}
