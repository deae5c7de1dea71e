//! Canonical Vietnamese province names and the informal aliases that map onto them.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

const CITY_PREFIX: &str = "Thành phố ";
const PROVINCE_PREFIX: &str = "Tỉnh ";

/// One of the 63 provinces, rendered with its official prefix.
///
/// Declaration order is the scan order used by address matching.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Province {
    #[strum(serialize = "Thành phố Hà Nội")]
    HaNoi,
    #[strum(serialize = "Thành phố Hồ Chí Minh")]
    HoChiMinh,
    #[strum(serialize = "Thành phố Hải Phòng")]
    HaiPhong,
    #[strum(serialize = "Thành phố Đà Nẵng")]
    DaNang,
    #[strum(serialize = "Thành phố Cần Thơ")]
    CanTho,
    #[strum(serialize = "Tỉnh Hà Giang")]
    HaGiang,
    #[strum(serialize = "Tỉnh Cao Bằng")]
    CaoBang,
    #[strum(serialize = "Tỉnh Bắc Kạn")]
    BacKan,
    #[strum(serialize = "Tỉnh Tuyên Quang")]
    TuyenQuang,
    #[strum(serialize = "Tỉnh Lào Cai")]
    LaoCai,
    #[strum(serialize = "Tỉnh Điện Biên")]
    DienBien,
    #[strum(serialize = "Tỉnh Lai Châu")]
    LaiChau,
    #[strum(serialize = "Tỉnh Sơn La")]
    SonLa,
    #[strum(serialize = "Tỉnh Yên Bái")]
    YenBai,
    #[strum(serialize = "Tỉnh Hòa Bình")]
    HoaBinh,
    #[strum(serialize = "Tỉnh Thái Nguyên")]
    ThaiNguyen,
    #[strum(serialize = "Tỉnh Lạng Sơn")]
    LangSon,
    #[strum(serialize = "Tỉnh Quảng Ninh")]
    QuangNinh,
    #[strum(serialize = "Tỉnh Bắc Giang")]
    BacGiang,
    #[strum(serialize = "Tỉnh Phú Thọ")]
    PhuTho,
    #[strum(serialize = "Tỉnh Vĩnh Phúc")]
    VinhPhuc,
    #[strum(serialize = "Tỉnh Bắc Ninh")]
    BacNinh,
    #[strum(serialize = "Tỉnh Hải Dương")]
    HaiDuong,
    #[strum(serialize = "Tỉnh Hưng Yên")]
    HungYen,
    #[strum(serialize = "Tỉnh Thái Bình")]
    ThaiBinh,
    #[strum(serialize = "Tỉnh Hà Nam")]
    HaNam,
    #[strum(serialize = "Tỉnh Nam Định")]
    NamDinh,
    #[strum(serialize = "Tỉnh Ninh Bình")]
    NinhBinh,
    #[strum(serialize = "Tỉnh Thanh Hóa")]
    ThanhHoa,
    #[strum(serialize = "Tỉnh Nghệ An")]
    NgheAn,
    #[strum(serialize = "Tỉnh Hà Tĩnh")]
    HaTinh,
    #[strum(serialize = "Tỉnh Quảng Bình")]
    QuangBinh,
    #[strum(serialize = "Tỉnh Quảng Trị")]
    QuangTri,
    #[strum(serialize = "Tỉnh Thừa Thiên Huế")]
    ThuaThienHue,
    #[strum(serialize = "Tỉnh Quảng Nam")]
    QuangNam,
    #[strum(serialize = "Tỉnh Quảng Ngãi")]
    QuangNgai,
    #[strum(serialize = "Tỉnh Bình Định")]
    BinhDinh,
    #[strum(serialize = "Tỉnh Phú Yên")]
    PhuYen,
    #[strum(serialize = "Tỉnh Khánh Hòa")]
    KhanhHoa,
    #[strum(serialize = "Tỉnh Ninh Thuận")]
    NinhThuan,
    #[strum(serialize = "Tỉnh Bình Thuận")]
    BinhThuan,
    #[strum(serialize = "Tỉnh Kon Tum")]
    KonTum,
    #[strum(serialize = "Tỉnh Gia Lai")]
    GiaLai,
    #[strum(serialize = "Tỉnh Đắk Lắk")]
    DakLak,
    #[strum(serialize = "Tỉnh Đắk Nông")]
    DakNong,
    #[strum(serialize = "Tỉnh Lâm Đồng")]
    LamDong,
    #[strum(serialize = "Tỉnh Bình Phước")]
    BinhPhuoc,
    #[strum(serialize = "Tỉnh Tây Ninh")]
    TayNinh,
    #[strum(serialize = "Tỉnh Bình Dương")]
    BinhDuong,
    #[strum(serialize = "Tỉnh Đồng Nai")]
    DongNai,
    #[strum(serialize = "Tỉnh Bà Rịa - Vũng Tàu")]
    BaRiaVungTau,
    #[strum(serialize = "Tỉnh Long An")]
    LongAn,
    #[strum(serialize = "Tỉnh Tiền Giang")]
    TienGiang,
    #[strum(serialize = "Tỉnh Bến Tre")]
    BenTre,
    #[strum(serialize = "Tỉnh Trà Vinh")]
    TraVinh,
    #[strum(serialize = "Tỉnh Vĩnh Long")]
    VinhLong,
    #[strum(serialize = "Tỉnh Đồng Tháp")]
    DongThap,
    #[strum(serialize = "Tỉnh An Giang")]
    AnGiang,
    #[strum(serialize = "Tỉnh Kiên Giang")]
    KienGiang,
    #[strum(serialize = "Tỉnh Hậu Giang")]
    HauGiang,
    #[strum(serialize = "Tỉnh Sóc Trăng")]
    SocTrang,
    #[strum(serialize = "Tỉnh Bạc Liêu")]
    BacLieu,
    #[strum(serialize = "Tỉnh Cà Mau")]
    CaMau,
}

impl Province {
    /// Canonical name with its official prefix.
    pub fn canonical_name(self) -> &'static str {
        self.into()
    }

    /// Name without the `Thành phố`/`Tỉnh` prefix.
    pub fn bare_name(self) -> &'static str {
        let name = self.canonical_name();
        name.strip_prefix(CITY_PREFIX)
            .or_else(|| name.strip_prefix(PROVINCE_PREFIX))
            .unwrap_or(name)
    }

    /// All provinces in scan order.
    pub fn all() -> impl Iterator<Item = Province> {
        Province::iter()
    }
}

impl Serialize for Province {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl<'de> Deserialize<'de> for Province {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| de::Error::custom(format!("unknown province: {name}")))
    }
}

/// Written-out informal forms, checked before the bare names.
const INFORMAL_ALIASES: &[(&str, Province)] = &[
    ("TP. Hồ Chí Minh", Province::HoChiMinh),
    ("TP.Hồ Chí Minh", Province::HoChiMinh),
    ("TP Hồ Chí Minh", Province::HoChiMinh),
    ("TP. HCM", Province::HoChiMinh),
    ("TP.HCM", Province::HoChiMinh),
    ("TPHCM", Province::HoChiMinh),
    ("TP. Hà Nội", Province::HaNoi),
    ("TP.Hà Nội", Province::HaNoi),
    ("TP Hà Nội", Province::HaNoi),
    ("TP. Hải Phòng", Province::HaiPhong),
    ("TP. Đà Nẵng", Province::DaNang),
    ("TP. Cần Thơ", Province::CanTho),
    ("Thừa Thiên - Huế", Province::ThuaThienHue),
    ("Thừa Thiên-Huế", Province::ThuaThienHue),
    ("Bà Rịa Vũng Tàu", Province::BaRiaVungTau),
    ("Bà Rịa-Vũng Tàu", Province::BaRiaVungTau),
    ("Hoà Bình", Province::HoaBinh),
    ("Thanh Hoá", Province::ThanhHoa),
    ("Khánh Hoà", Province::KhanhHoa),
    ("Đăk Lăk", Province::DakLak),
    ("Đắc Lắc", Province::DakLak),
    ("Đăk Nông", Province::DakNong),
];

/// Short nicknames, checked last because they are the most likely to appear
/// inside unrelated street or ward names.
const NICKNAMES: &[(&str, Province)] = &[
    ("Sài Gòn", Province::HoChiMinh),
    ("HCM", Province::HoChiMinh),
    ("Huế", Province::ThuaThienHue),
    ("Vũng Tàu", Province::BaRiaVungTau),
];

/// Ordered alias table. The first occurrence of a key wins.
pub static PROVINCE_ALIASES: Lazy<Vec<(String, Province)>> = Lazy::new(|| {
    let bare = Province::iter().map(|p| (p.bare_name(), p));
    let mut seen = HashSet::new();

    INFORMAL_ALIASES
        .iter()
        .copied()
        .chain(bare)
        .chain(NICKNAMES.iter().copied())
        .filter(|(alias, _)| seen.insert(*alias))
        .map(|(alias, province)| (alias.to_string(), province))
        .collect()
});
