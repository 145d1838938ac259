pub mod certificate_registry;
