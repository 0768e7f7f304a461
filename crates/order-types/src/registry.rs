//! Registry trait for self-registering implementations.
//!
//! Every backend (order storage, directories, wallet, catalog) exposes a
//! `Registry` type implementing this trait so the service binary can wire
//! backends by the name used in configuration.

/// Base trait for implementation registries.
///
/// Each backend module must provide a Registry struct that implements this
/// trait, declaring its configuration name and factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "postgres" for orders.implementations.postgres
	/// - "memory" for customers.implementations.memory
	/// - "http" for wallet.implementations.http
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each crate defines its own factory type, for example
	/// `OrderStorageFactory` or `WalletFactory`.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
