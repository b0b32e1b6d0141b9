use thiserror::Error;

/// Why a rules request could not be compiled.
///
/// A failed compilation is a distinct signal, never conflated with an
/// empty-but-valid config: `Ok(RulesConfig::default())` means nothing was
/// requested, `Err(CyclicDependency)` means the request was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("requested rules contain a cyclic dependency")]
    CyclicDependency,

    #[error("duplicate rule id '{id}'")]
    DuplicateId { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_dependency_message() {
        assert_eq!(
            CompileError::CyclicDependency.to_string(),
            "requested rules contain a cyclic dependency"
        );
    }

    #[test]
    fn duplicate_id_message() {
        let err = CompileError::DuplicateId {
            id: "emailOnBlacklist".into(),
        };
        assert_eq!(err.to_string(), "duplicate rule id 'emailOnBlacklist'");
    }
}
