use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Misuse failures surface synchronously as one of these variants; network
/// and decode failures settle into the loader's failed count instead of
/// aborting the pass.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no loader supports the file type of {link:?} (asset {key:?})")]
    UnsupportedAssetType { key: String, link: String },

    #[error("asset loading has already started")]
    AlreadyStarted,

    #[error("fetch failed for {link:?}: {message}")]
    Fetch { link: String, message: String },

    #[error("could not decode {link:?}: {message}")]
    Decode { link: String, message: String },

    #[error("no page container with id {0:?} in the document")]
    MissingContainer(String),

    #[error("no element with id {0:?} in the document")]
    MissingElement(String),

    #[error("element {0:?} is missing the \"page\" class")]
    NotAPage(String),

    #[error("the action {0:?} is not registered")]
    UnknownAction(String),

    #[error("no page registered under {0:?}")]
    UnregisteredPage(String),
}
