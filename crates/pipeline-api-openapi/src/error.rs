//! Typed error enum for the `pipeline-api-openapi` library API.
//!
//! Library consumers can match on specific variants. The CLI (`main.rs`)
//! converts these to `anyhow::Error` at the binary boundary for richer
//! context messages.

/// Errors produced by `pipeline-api-openapi` library operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// File I/O failure (reading a manifest or config, writing the document).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON parsing or serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A component schema with this name is already registered.
    ///
    /// Two resources (or two roles of one resource) derive the same
    /// `UpperCamel` name; rename one of them.
    #[error("schema '{name}' is already registered in components.schemas")]
    SchemaNameCollision {
        /// The duplicated component name.
        name: String,
    },

    /// Flattening two distinct `definitions` entries would produce the same
    /// top-level name (e.g. `A` + `bC` and `Ab` + `c` both give `AbC`).
    #[error(
        "flattening '{source_pointer}' would overwrite schema '{name}'; \
         rename one of the definitions"
    )]
    FlattenCollision {
        /// The synthesized top-level name.
        name: String,
        /// Pointer of the definition being moved.
        source_pointer: String,
    },

    /// Path template already carries an operation for this verb.
    #[error("operation {method} {path} is already documented")]
    DuplicateOperation {
        /// HTTP verb, lowercase.
        method: String,
        /// Path template.
        path: String,
    },
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time assertion that `Error` is `Send + Sync`.
    /// Required for use in async contexts and across thread boundaries.
    const _: () = {
        const fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    };

    #[test]
    fn flatten_collision_message_names_both_sides() {
        let err = Error::FlattenCollision {
            name: "AbC".into(),
            source_pointer: "#/components/schemas/A/definitions/bC".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AbC") && msg.contains("/definitions/bC"), "{msg}");
    }
}
