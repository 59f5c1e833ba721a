/// Source of the opaque participation tokens handed to invitees.
pub trait TokenGenerator {
    fn generate(&self) -> String;
}

/// Default generator: lowercase ULIDs, unique and URL-safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidTokenGenerator;

impl TokenGenerator for UlidTokenGenerator {
    fn generate(&self) -> String {
        ulid::Ulid::new().to_string().to_lowercase()
    }
}
