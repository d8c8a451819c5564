pub use placement_openapi::ApiDoc;
