use std::env::current_dir;
use std::path::Path;

use anyhow::{Context, Error};
use console::Term;
use once_cell::unsync::OnceCell;

use crate::e621::query::{parse_pages, Rating, SearchConfig};
use crate::e621::E621WebConnector;
use crate::io::locale::{Language, Messages};
use crate::io::{Config, CredentialProvider, LoginFile, CONFIG_NAME, LOGIN_NAME};
use crate::kemono::KemonoConnector;
use crate::resolver::{AuthorResolver, KemonoAuthor, Platform, Resolution};
use crate::sender::RequestSender;
use crate::tui::{ask, ask_numbered, pause, pick_one, Pick};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The authors who created the package.
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// Operator name used for requests made before any login is loaded.
const ANONYMOUS: &str = "anonymous";

/// Main menu choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ByAuthor,
    ByTag,
}

impl Mode {
    fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Mode::ByAuthor),
            "2" => Some(Mode::ByTag),
            _ => None,
        }
    }
}

/// A program class that handles the flow of the downloader user experience and steps of execution.
pub(crate) struct Program {
    config: Config,
    messages: Messages,
    /// Unauthenticated sender for the existence checks and the aggregation site.
    anonymous: RequestSender,
    credentials: Box<dyn CredentialProvider>,
    /// e621 sender with the user's login, created on first use.
    e621_sender: OnceCell<RequestSender>,
}

impl Program {
    /// Loads config and locale from `dir`, asking for the language first.
    pub(crate) fn new(dir: &Path) -> Result<Self, Error> {
        let config = Config::load_or_create(&dir.join(CONFIG_NAME))?;
        let language = Self::select_language()?;
        let messages = Messages::load(language, dir)?;
        trace!("Language: {}", messages.language().code());
        let anonymous = RequestSender::new(ANONYMOUS, config.file_timeout())?;

        Ok(Self {
            config,
            messages,
            anonymous,
            credentials: Box::new(LoginFile::new(dir.join(LOGIN_NAME))),
            e621_sender: OnceCell::new(),
        })
    }

    fn select_language() -> Result<Language, Error> {
        println!("Select language / Выберите язык:");
        println!("[1] Русский");
        println!("[2] English");
        Ok(Language::from_choice(&ask(">")?))
    }

    /// Runs the downloader program.
    pub(crate) fn run(&self) -> Result<(), Error> {
        Term::stdout().set_title("e621 & kemono downloader");
        trace!("Starting {NAME}...");
        trace!("Program Version: {VERSION}");
        trace!("Program Authors: {AUTHORS}");
        let working_dir = current_dir().context("Unable to get working directory")?;
        trace!("Program Working Directory: {}", working_dir.display());
        trace!("Download Directory: {}", self.config.download_directory().display());

        loop {
            let messages = &self.messages;
            println!("\n{}", messages.get("select_mode"));
            println!("{}", messages.get("by_author"));
            println!("{}", messages.get("by_tag"));

            match Mode::from_choice(&ask(messages.get("prompt_choice"))?) {
                Some(Mode::ByAuthor) => self.search_by_author()?,
                Some(Mode::ByTag) => self.search_by_tag()?,
                None => {
                    println!("{}", messages.get("invalid"));
                    pause(messages);
                    continue;
                }
            }

            println!("\n{}", messages.get("next_action"));
            println!("{}", messages.get("again"));
            println!("{}", messages.get("exit"));
            if ask(messages.get("prompt_choice"))? != "1" {
                println!("{}", messages.get("bye"));
                info!("Exiting at user request...");
                return Ok(());
            }
        }
    }

    /// The e621 sender, reading (or asking for) the login the first time it's needed.
    fn e621_sender(&self) -> Result<&RequestSender, Error> {
        self.e621_sender.get_or_try_init(|| {
            let login = self.credentials.login()?;
            trace!("Login Username: {}", login.username());
            trace!("Login API Key: {}", "*".repeat(login.api_key().len()));
            Ok(RequestSender::new(login.username(), self.config.file_timeout())?
                .with_basic_auth(login.username(), login.api_key()))
        })
    }

    fn prompt_search(&self, base_tag: &str, from_author: bool) -> Result<SearchConfig, Error> {
        let messages = &self.messages;
        let exclude = ask(messages.get("exclude_tags"))?;

        println!("{}", messages.get("select_rating"));
        println!("{}", messages.get("rating_all"));
        println!("{}", messages.get("rating_s"));
        println!("{}", messages.get("rating_q"));
        println!("{}", messages.get("rating_e"));
        let rating = Rating::from_choice(&ask(">")?);

        let pages = if from_author {
            self.config.author_pages()
        } else {
            parse_pages(&ask(messages.get("pages"))?, self.config.default_pages())
        };

        Ok(SearchConfig::new(base_tag, exclude.split_whitespace(), rating, pages))
    }

    fn run_e621(&self, search: &SearchConfig) -> Result<(), Error> {
        let sender = self.e621_sender()?;
        let report = E621WebConnector::new(sender, &self.config).run(search, &self.messages)?;
        trace!(
            "Search \"{}\" saved {} of {} posts into {}{}",
            report.query,
            report.tally.new + report.tally.cached,
            report.tally.total(),
            report.folder.display(),
            if report.interrupted { " (listing incomplete)" } else { "" }
        );
        pause(&self.messages);
        Ok(())
    }

    fn run_kemono(&self, author: &KemonoAuthor) -> Result<(), Error> {
        let messages = &self.messages;
        debug!("Kemono creator \"{}\" has id {}", author.name, author.id);
        let picked = pick_one(author.services.as_slice(), || {
            ask_numbered(messages.get("found_on"), messages.get("select_service"), author.services.as_slice())
        })?;
        let service = match picked {
            Pick::Chosen(service) => service,
            Pick::Nothing => {
                println!("{}", messages.get("not_found"));
                pause(messages);
                return Ok(());
            }
            Pick::Refused(err) => {
                debug!("Service selection refused: {err}");
                println!("{}", messages.get("invalid"));
                pause(messages);
                return Ok(());
            }
        };
        if author.services.len() == 1 {
            println!("{} {service}", messages.get("found_on"));
        }

        KemonoConnector::new(&self.anonymous, &self.config).run(&service, &author.id, messages)?;
        pause(messages);
        Ok(())
    }

    fn search_by_tag(&self) -> Result<(), Error> {
        let tag = ask(self.messages.get("input_tag"))?;
        let search = self.prompt_search(&tag, false)?;
        self.run_e621(&search)
    }

    fn search_by_author(&self) -> Result<(), Error> {
        let messages = &self.messages;
        let author = ask(messages.get("input_author"))?;
        if author.is_empty() {
            println!("{}", messages.get("invalid"));
            pause(messages);
            return Ok(());
        }

        println!("{}", messages.get("searching"));
        let resolver = AuthorResolver::new(
            &self.anonymous,
            self.config.e621_base_url(),
            &self.anonymous,
            self.config.kemono_base_url(),
        );
        let resolution = resolver.resolve(&author);
        for (platform, reason) in resolution.failures() {
            println!("{} {platform} ({reason})", messages.get("check_failed"));
        }

        let picked = choose_platform(&resolution, |platforms| {
            ask_numbered(messages.get("found_on"), messages.get("select_platform"), platforms)
        })?;
        let platform = match picked {
            Pick::Chosen(platform) => platform,
            Pick::Nothing => {
                println!("{}", messages.get("not_found"));
                pause(messages);
                return Ok(());
            }
            Pick::Refused(err) => {
                debug!("Platform selection refused: {err}");
                println!("{}", messages.get("invalid"));
                pause(messages);
                return Ok(());
            }
        };
        info!("Downloading \"{author}\" from {platform}");

        match platform {
            Platform::E621 => {
                let search = self.prompt_search(&author, true)?;
                self.run_e621(&search)
            }
            Platform::Kemono => match resolution.kemono.found() {
                Some(kemono_author) => self.run_kemono(kemono_author),
                None => Ok(()),
            },
        }
    }
}

/// Decides which platform an author lookup downloads from. `answer` is only asked when the
/// author is on more than one.
fn choose_platform<F>(resolution: &Resolution, answer: F) -> Result<Pick<Platform>, Error>
where
    F: FnOnce(&[Platform]) -> Result<String, Error>,
{
    let platforms = resolution.platforms();
    pick_one(platforms.as_slice(), || answer(platforms.as_slice()))
}
