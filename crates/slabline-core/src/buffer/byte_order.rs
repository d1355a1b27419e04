/// 缓冲在分配时确定的字节序，之后不可修改。
///
/// 分级池创建的每一块缓冲（无论复用还是新分配）都固定为 [`ByteOrder::LittleEndian`]，
/// 与 BSON 等小端线协议保持一致。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// 当前平台的本机字节序。
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    pub const fn is_little_endian(self) -> bool {
        matches!(self, ByteOrder::LittleEndian)
    }
}
