pub mod course;
pub mod curriculum;
pub mod enrollment;
pub mod group;
pub mod progress;
pub mod student;
pub mod subject;
pub mod system_state;

pub use course::Course;
pub use curriculum::CurriculumEntry;
pub use enrollment::{Enrollment, GradeAudit};
pub use group::{Group, NewGroup, ScheduleSlot};
pub use progress::ProgressRecord;
pub use student::Student;
pub use subject::Subject;
pub use system_state::SystemState;
