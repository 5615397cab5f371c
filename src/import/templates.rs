#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Student,
    Teacher,
    Generic,
}

const STUDENT_TEMPLATE: &str = "NAME,EMAIL,PHONE,ROLE,ROLL NUMBER,CLASS
Aarav Sharma,aarav.sharma@example.com,9876543210,student,1,10 A
Diya Patel,diya.patel@example.com,9876543211,student,2,10 A
Kabir Singh,kabir.singh@example.com,9876543212,student,3,10 A
";

const TEACHER_TEMPLATE: &str = "NAME,EMAIL,PHONE,ROLE,EMPLOYEE ID
Priya Verma,priya.verma@example.com,9876500001,teacher,EMP001
Rahul Mehta,rahul.mehta@example.com,9876500002,teacher,EMP002
";

const GENERIC_TEMPLATE: &str = "NAME,EMAIL,PHONE,ROLE,ROLL NUMBER,CLASS,EMPLOYEE ID
Aarav Sharma,aarav.sharma@example.com,9876543210,student,1,10 A,-
Priya Verma,priya.verma@example.com,9876500001,teacher,,,EMP001
";

impl TemplateKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Some(Self::Student),
            "teacher" | "teachers" => Some(Self::Teacher),
            "generic" | "users" => Some(Self::Generic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Generic => "generic",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Student => "student_import_template.csv",
            Self::Teacher => "teacher_import_template.csv",
            Self::Generic => "user_import_template.csv",
        }
    }

    /// Templates are a convenience download; uploads are never validated
    /// against them.
    pub fn contents(self) -> &'static str {
        match self {
            Self::Student => STUDENT_TEMPLATE,
            Self::Teacher => TEACHER_TEMPLATE,
            Self::Generic => GENERIC_TEMPLATE,
        }
    }
}
