//! # TCM数据库模块
//!
//! 负责诊所业务数据的存储和管理，提供PostgreSQL连接池、完整的CRUD操作，
//! 以及用于开发和测试的内存实现。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod repository;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use memory::MemoryRepository;
pub use queries::DatabaseQueries;
pub use repository::{
    ClinicRepository, DiagnosticImageRepository, DoctorRepository, PatientRepository,
    PrescriptionRepository, VisitRepository,
};
