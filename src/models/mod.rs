mod equipment;
mod job;
mod pagination;
mod payment;
mod rental;
mod review;
mod state;
mod transition;
mod user;
mod visibility;

pub use equipment::{Equipment, EquipmentCategory, EquipmentResponse, FuelType, PowerType};
pub use job::{
    ApplicationStatus, Job, JobApplication, JobApplicationResponse, JobCategory, JobResponse,
    JobStatus,
};
pub use pagination::{Page, PaginatedResponse, PaginationInfo, PaginationQuery};
pub use payment::{Payment, PaymentResponse, PaymentStatus, PaymentTarget, PaymentType};
pub use rental::{EquipmentRental, RentalResponse, RentalStatus};
pub use review::{Review, ReviewResponse, ReviewType};
pub use state::{AppState, Services};
pub use transition::InvalidTransition;
pub use user::{User, UserPublicProfile, UserResponse};
pub use visibility::Visibility;
