//! Native status codes (`cl_int`) as a typed value.

use std::fmt;

/// A status code returned by a native entry point.
///
/// Zero is success; every failure is negative. Unknown codes are preserved
/// verbatim so vendor extensions survive the round trip.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Status(pub i32);

macro_rules! status_codes {
    ($($name:ident = $code:literal),* $(,)?) => {
        impl Status {
            $(pub const $name: Self = Self($code);)*

            /// Symbolic name of a known status code.
            pub const fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    SUCCESS = 0,
    DEVICE_NOT_FOUND = -1,
    DEVICE_NOT_AVAILABLE = -2,
    COMPILER_NOT_AVAILABLE = -3,
    MEM_OBJECT_ALLOCATION_FAILURE = -4,
    OUT_OF_RESOURCES = -5,
    OUT_OF_HOST_MEMORY = -6,
    PROFILING_INFO_NOT_AVAILABLE = -7,
    MEM_COPY_OVERLAP = -8,
    IMAGE_FORMAT_MISMATCH = -9,
    IMAGE_FORMAT_NOT_SUPPORTED = -10,
    BUILD_PROGRAM_FAILURE = -11,
    MAP_FAILURE = -12,
    MISALIGNED_SUB_BUFFER_OFFSET = -13,
    EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST = -14,
    INVALID_VALUE = -30,
    INVALID_DEVICE_TYPE = -31,
    INVALID_PLATFORM = -32,
    INVALID_DEVICE = -33,
    INVALID_CONTEXT = -34,
    INVALID_QUEUE_PROPERTIES = -35,
    INVALID_COMMAND_QUEUE = -36,
    INVALID_HOST_PTR = -37,
    INVALID_MEM_OBJECT = -38,
    INVALID_IMAGE_FORMAT_DESCRIPTOR = -39,
    INVALID_IMAGE_SIZE = -40,
    INVALID_SAMPLER = -41,
    INVALID_BINARY = -42,
    INVALID_BUILD_OPTIONS = -43,
    INVALID_PROGRAM = -44,
    INVALID_PROGRAM_EXECUTABLE = -45,
    INVALID_KERNEL_NAME = -46,
    INVALID_KERNEL_DEFINITION = -47,
    INVALID_KERNEL = -48,
    INVALID_ARG_INDEX = -49,
    INVALID_ARG_VALUE = -50,
    INVALID_ARG_SIZE = -51,
    INVALID_KERNEL_ARGS = -52,
    INVALID_WORK_DIMENSION = -53,
    INVALID_WORK_GROUP_SIZE = -54,
    INVALID_WORK_ITEM_SIZE = -55,
    INVALID_GLOBAL_OFFSET = -56,
    INVALID_EVENT_WAIT_LIST = -57,
    INVALID_EVENT = -58,
    INVALID_OPERATION = -59,
    INVALID_GL_OBJECT = -60,
    INVALID_BUFFER_SIZE = -61,
    INVALID_MIP_LEVEL = -62,
    INVALID_GLOBAL_WORK_SIZE = -63,
    INVALID_PROPERTY = -64,
    INVALID_GL_SHAREGROUP_REFERENCE_KHR = -1000,
    PLATFORM_NOT_FOUND_KHR = -1001,
}

impl Status {
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Turn the status into a `Result`, keeping the failing code.
    pub const fn ok(self) -> Result<(), Status> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    pub const fn code(self) -> i32 {
        self.0
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "CL_{name} ({})", self.0),
            None => write!(f, "CL_UNKNOWN_STATUS ({})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn success_is_the_only_ok_status() {
        assert!(Status::SUCCESS.is_success());
        assert_eq!(Status::SUCCESS.ok(), Ok(()));
        assert_eq!(Status::INVALID_VALUE.ok(), Err(Status::INVALID_VALUE));
    }

    #[test]
    fn display_uses_symbolic_name() {
        insta::assert_snapshot!(
            Status::BUILD_PROGRAM_FAILURE.to_string(),
            @"CL_BUILD_PROGRAM_FAILURE (-11)"
        );
        insta::assert_snapshot!(Status(-9999).to_string(), @"CL_UNKNOWN_STATUS (-9999)");
    }

    proptest! {
        #[test]
        fn unknown_codes_are_preserved(code in -5000_i32..-1100) {
            let status = Status::from(code);
            prop_assert_eq!(status.code(), code);
            prop_assert!(!status.is_success());
            prop_assert!(status.name().is_none());
        }
    }
}
