use crate::build_info::BUILD_INFO;
use crate::config::GlobalConfig;
use crate::options::{Options, non_blank};
use crate::output::{self, Destination};
use crate::provider::{GcloudFetcher, SecretFetcher, SecretRef};
use crate::{InjectError, Result};
use std::io::{self, Write};
use tracing::debug;

const NOT_SET: &str = "<NOT SET>";
const REDACTED: &str = "<REDACTED>";

/// One invocation of the fetch → parse → render/launch pipeline.
pub struct Injector {
    options: Options,
    global_config: Option<GlobalConfig>,
}

impl Injector {
    pub fn new(options: Options, global_config: Option<GlobalConfig>) -> Self {
        Self {
            options,
            global_config,
        }
    }

    /// Validates `options`, then loads the user configuration.
    ///
    /// With `debug` set the options are written to stderr first, so they
    /// show up even when validation rejects them. Validation runs before
    /// the configuration file is touched.
    pub fn load(options: Options) -> Result<Self> {
        let mut injector = Self::new(options, None);
        if injector.options.debug {
            injector.debug(&mut io::stderr().lock())?;
        }

        injector.options.validate()?;
        injector.global_config = GlobalConfig::load()?;
        Ok(injector)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Runs the pipeline against Secret Manager through `gcloud`.
    pub fn run(&self) -> Result<i32> {
        self.run_with(&GcloudFetcher::from_env())
    }

    /// Runs the pipeline with the given fetcher.
    ///
    /// Returns the exit code of the invocation: 0 for the text formats, the
    /// child's exit code when a command was run.
    pub fn run_with(&self, fetcher: &dyn SecretFetcher) -> Result<i32> {
        let credentials = self.options.credential_source()?;
        let secret = self.secret_ref()?;
        let mode = self.options.output_mode();
        debug!(secret = %secret, provider = fetcher.name(), mode = mode.as_str(), "running");

        let payload = fetcher.fetch(&secret, &credentials)?;
        let rendering = output::render(mode, &payload)?;
        let destination = Destination::from_option(self.options.output_file.as_deref());

        output::route(
            rendering,
            &destination,
            &self.options.command,
            self.preserve_env(),
        )
    }

    /// The secret to fetch, with configuration defaults applied.
    pub fn secret_ref(&self) -> Result<SecretRef> {
        let defaults = self.global_config.as_ref().map(|config| &config.defaults);

        let project = non_blank(self.options.project.as_deref())
            .or_else(|| defaults.and_then(|d| non_blank(d.project.as_deref())))
            .ok_or(InjectError::MissingOption("project"))?;
        let name = non_blank(self.options.secret_name.as_deref())
            .or_else(|| defaults.and_then(|d| non_blank(d.secret_name.as_deref())))
            .ok_or(InjectError::MissingOption("secret-name"))?;
        let version = non_blank(self.options.secret_version.as_deref())
            .or_else(|| defaults.and_then(|d| non_blank(d.secret_version.as_deref())))
            .map(str::to_string);

        Ok(SecretRef::new(project, name, version))
    }

    pub fn preserve_env(&self) -> bool {
        self.options.preserve_env
            || self
                .global_config
                .as_ref()
                .is_some_and(|config| config.defaults.preserve_env)
    }

    /// Writes build information, the options and the positional arguments.
    /// The inline credential is never printed. `preserve-env` includes the
    /// configuration default only once it has been loaded.
    pub fn debug(&self, writer: &mut dyn Write) -> io::Result<()> {
        let options = &self.options;
        writeln!(writer, "{}", BUILD_INFO)?;

        let text = |value: Option<&str>| non_blank(value).unwrap_or(NOT_SET).to_string();
        let key_value = match non_blank(options.key_value.as_deref()) {
            Some(_) => REDACTED.to_string(),
            None => NOT_SET.to_string(),
        };

        let rows = [
            ("key-file", text(options.key_file.as_deref())),
            ("key-value", key_value),
            ("format-ash", options.format_ash.to_string()),
            ("format-bash", options.format_bash.to_string()),
            ("format-json", options.format_json.to_string()),
            ("format-raw", options.format_raw.to_string()),
            ("preserve-env", self.preserve_env().to_string()),
            ("output-file", text(options.output_file.as_deref())),
            ("project", text(options.project.as_deref())),
            ("secret-name", text(options.secret_name.as_deref())),
            ("secret-version", text(options.secret_version.as_deref())),
            ("debug", options.debug.to_string()),
        ];
        for (name, value) in rows {
            writeln!(writer, "{}: {}", name, value)?;
        }

        for (index, arg) in options.command.iter().enumerate() {
            writeln!(writer, "  [{}]: {}", index, arg)?;
        }
        Ok(())
    }
}
