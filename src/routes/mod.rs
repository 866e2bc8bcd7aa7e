// Export all route modules
pub mod campaigns;
pub mod genai;
pub mod otp;

// Re-export all route handlers for easy importing
pub use campaigns::*;
pub use genai::*;
pub use otp::*;
