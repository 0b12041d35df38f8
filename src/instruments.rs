use serde::{Deserialize, Serialize};

use crate::scoring::lookup_threshold;

/// Which value one checklist cell may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ItemDomain {
    Numeric { max: i64 },
    /// B/C/K/T, mapped 3/2/1/0.
    Letter,
    /// YA/TIDAK, mapped 3/0.
    YesNo,
}

impl ItemDomain {
    pub fn accepts(&self, raw: &str) -> bool {
        let t = raw.trim();
        match self {
            ItemDomain::Numeric { max } => match t.parse::<i64>() {
                Ok(v) => v >= 0 && v <= *max,
                Err(_) => false,
            },
            ItemDomain::Letter => matches!(t.to_ascii_uppercase().as_str(), "B" | "C" | "K" | "T"),
            ItemDomain::YesNo => matches!(t.to_ascii_uppercase().as_str(), "YA" | "TIDAK"),
        }
    }
}

/// What the feedback bank thresholds compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackInput {
    Percentage,
    RawScore,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackEntry {
    pub catatan: &'static str,
    pub tindak_lanjut: &'static str,
    pub rekomendasi: Option<&'static str>,
}

/// Ordered highest-threshold-first; last entry must carry threshold 0.
pub struct FeedbackBank {
    pub input: FeedbackInput,
    pub table: &'static [(i64, FeedbackEntry)],
}

impl FeedbackBank {
    pub fn select(&self, percentage: i64, total_score: f64) -> &'static FeedbackEntry {
        let value = match self.input {
            FeedbackInput::Percentage => percentage,
            FeedbackInput::RawScore => total_score.floor() as i64,
        };
        lookup_threshold(value, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    #[serde(rename = "administrasi")]
    LessonAdmin,
    #[serde(rename = "telaah-atp")]
    AtpReview,
    #[serde(rename = "telaah-modul")]
    ModuleReview,
    #[serde(rename = "observasi")]
    ClassObservation,
    #[serde(rename = "penilaian")]
    Assessment,
    #[serde(rename = "administrasi-ptt")]
    StaffAdmin,
    #[serde(rename = "ekstrakurikuler")]
    Extracurricular,
}

impl InstrumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::LessonAdmin => "administrasi",
            InstrumentKind::AtpReview => "telaah-atp",
            InstrumentKind::ModuleReview => "telaah-modul",
            InstrumentKind::ClassObservation => "observasi",
            InstrumentKind::Assessment => "penilaian",
            InstrumentKind::StaffAdmin => "administrasi-ptt",
            InstrumentKind::Extracurricular => "ekstrakurikuler",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "administrasi" => Some(InstrumentKind::LessonAdmin),
            "telaah-atp" => Some(InstrumentKind::AtpReview),
            "telaah-modul" => Some(InstrumentKind::ModuleReview),
            "observasi" => Some(InstrumentKind::ClassObservation),
            "penilaian" => Some(InstrumentKind::Assessment),
            "administrasi-ptt" => Some(InstrumentKind::StaffAdmin),
            "ekstrakurikuler" => Some(InstrumentKind::Extracurricular),
            _ => None,
        }
    }
}

pub struct InstrumentDef {
    pub kind: InstrumentKind,
    pub title: &'static str,
    pub items: &'static [&'static str],
    pub domain: ItemDomain,
    pub max_score: f64,
    /// Counts toward the teaching composite.
    pub composite: bool,
    pub bank: FeedbackBank,
}

impl InstrumentDef {
    pub fn item_count(&self) -> i64 {
        self.items.len() as i64
    }
}

pub fn catalog() -> &'static [InstrumentDef] {
    &CATALOG
}

pub fn find(kind: InstrumentKind) -> &'static InstrumentDef {
    CATALOG
        .iter()
        .find(|d| d.kind == kind)
        .expect("catalog covers every kind")
}

/// The five instruments whose percentages average into a teacher's composite.
pub fn composite_kinds() -> impl Iterator<Item = &'static InstrumentDef> {
    CATALOG.iter().filter(|d| d.composite)
}

const ADMINISTRASI_ITEMS: &[&str] = &[
    "Kalender pendidikan",
    "Program tahunan",
    "Program semester",
    "Silabus / alur tujuan pembelajaran",
    "RPP / modul ajar",
    "Jadwal pelajaran",
    "Agenda harian guru",
    "Daftar hadir peserta didik",
    "Daftar nilai",
    "KKM / kriteria ketercapaian tujuan pembelajaran",
    "Buku pegangan guru",
    "Buku teks peserta didik",
    "Jurnal pembelajaran",
];

const TELAAH_ATP_ITEMS: &[&str] = &[
    "Identitas ATP lengkap (satuan pendidikan, fase, mata pelajaran)",
    "Rumusan capaian pembelajaran sesuai fase",
    "Tujuan pembelajaran diturunkan dari capaian pembelajaran",
    "Tujuan memuat kompetensi dan lingkup materi",
    "Urutan tujuan pembelajaran logis dan sistematis",
    "Alur antar tujuan berkesinambungan",
    "Alokasi waktu proporsional terhadap cakupan materi",
    "Kata kerja operasional terukur",
    "Cakupan materi sesuai karakteristik peserta didik",
    "Mengakomodasi dimensi profil pelajar Pancasila",
    "Kesesuaian dengan sarana dan lingkungan belajar",
    "Dokumen tersusun rapi dan terdokumentasi",
];

const TELAAH_MODUL_ITEMS: &[&str] = &[
    "Identitas modul lengkap (penyusun, jenjang, kelas, alokasi waktu)",
    "Kompetensi awal peserta didik dipetakan",
    "Tujuan pembelajaran sesuai ATP",
    "Tujuan memuat indikator ketercapaian",
    "Pemahaman bermakna dirumuskan",
    "Pertanyaan pemantik relevan dengan materi",
    "Kegiatan pendahuluan terstruktur",
    "Kegiatan inti menggambarkan model pembelajaran aktif",
    "Kegiatan penutup memuat refleksi",
    "Diferensiasi untuk peserta didik beragam",
    "Media dan sumber belajar disebutkan",
    "Lembar kerja peserta didik tersedia",
    "Asesmen awal (diagnostik) direncanakan",
    "Asesmen formatif terintegrasi dalam kegiatan",
    "Asesmen sumatif sesuai tujuan pembelajaran",
    "Pengayaan dan remedial direncanakan",
    "Daftar pustaka / glosarium dicantumkan",
];

const OBSERVASI_ITEMS: &[&str] = &[
    "Menyiapkan peserta didik secara psikis dan fisik",
    "Memberi motivasi belajar secara kontekstual",
    "Mengajukan pertanyaan yang mengaitkan pengetahuan sebelumnya",
    "Menyampaikan tujuan pembelajaran",
    "Menyampaikan cakupan materi dan uraian kegiatan",
    "Penguasaan materi pembelajaran",
    "Mengaitkan materi dengan pengetahuan lain yang relevan",
    "Menyajikan materi secara sistematis",
    "Melaksanakan pembelajaran sesuai alokasi waktu",
    "Menerapkan model/metode sesuai karakteristik materi",
    "Menumbuhkan partisipasi aktif peserta didik",
    "Merespon positif pertanyaan dan pendapat peserta didik",
    "Menggunakan media pembelajaran secara efektif",
    "Melibatkan peserta didik dalam pemanfaatan media",
    "Menggunakan bahasa lisan yang jelas dan lancar",
    "Menggunakan bahasa tulis yang baik dan benar",
    "Memantau kemajuan belajar selama proses",
    "Melaksanakan penilaian proses",
    "Membuat rangkuman bersama peserta didik",
    "Melakukan refleksi terhadap kegiatan yang sudah dilaksanakan",
    "Memberikan umpan balik terhadap proses dan hasil",
    "Menyampaikan rencana pembelajaran berikutnya",
    "Menutup pembelajaran dengan berdoa/salam",
];

const PENILAIAN_ITEMS: &[&str] = &[
    "Menyusun rencana penilaian sesuai tujuan pembelajaran",
    "Menetapkan kriteria ketercapaian tujuan pembelajaran",
    "Menyusun kisi-kisi instrumen penilaian",
    "Mengembangkan instrumen sesuai kaidah penulisan",
    "Melaksanakan asesmen diagnostik",
    "Melaksanakan asesmen formatif",
    "Melaksanakan asesmen sumatif",
    "Mengolah dan menganalisis hasil penilaian",
    "Mendokumentasikan hasil penilaian",
    "Melaksanakan program remedial",
    "Melaksanakan program pengayaan",
    "Melaporkan hasil penilaian kepada pemangku kepentingan",
];

const ADMINISTRASI_PTT_ITEMS: &[&str] = &[
    "Buku agenda surat masuk dan keluar",
    "Arsip persuratan tertata",
    "Buku induk / data pokok tertib",
    "Daftar hadir pegawai terisi",
    "Dokumen inventaris sarana prasarana",
    "Laporan keadaan barang berkala",
    "Administrasi keuangan tertib",
    "Pelayanan terhadap warga sekolah",
    "Kebersihan dan kerapian ruang kerja",
    "Ketepatan waktu penyelesaian tugas",
];

const EKSTRAKURIKULER_ITEMS: &[&str] = &[
    "Program kerja ekstrakurikuler tersusun",
    "Jadwal latihan terdokumentasi",
    "Daftar hadir peserta terisi rutin",
    "Jurnal kegiatan latihan terisi",
    "Sarana kegiatan memadai dan terawat",
    "Pembina hadir sesuai jadwal",
    "Target capaian/prestasi dirumuskan",
    "Evaluasi kegiatan dilaksanakan berkala",
    "Keterlibatan peserta didik aktif",
    "Laporan kegiatan disampaikan ke kepala sekolah",
];

const ADMINISTRASI_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "Administrasi pembelajaran sangat lengkap dan tertata dengan baik.",
        tindak_lanjut: "Dipertahankan dan dapat dijadikan contoh bagi guru lain.",
        rekomendasi: None,
    }),
    (81, FeedbackEntry {
        catatan: "Administrasi pembelajaran sudah baik, beberapa dokumen perlu dimutakhirkan.",
        tindak_lanjut: "Melengkapi dokumen yang belum dimutakhirkan sebelum supervisi berikutnya.",
        rekomendasi: None,
    }),
    (71, FeedbackEntry {
        catatan: "Administrasi pembelajaran cukup, sebagian dokumen belum tersedia.",
        tindak_lanjut: "Pembinaan penyusunan administrasi oleh kepala sekolah/guru senior.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "Administrasi pembelajaran masih kurang dan belum tertata.",
        tindak_lanjut: "Pendampingan intensif penyusunan administrasi pembelajaran.",
        rekomendasi: None,
    }),
];

const TELAAH_ATP_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "ATP disusun sangat baik, alur tujuan runtut dan sesuai capaian pembelajaran.",
        tindak_lanjut: "Dipertahankan; ATP dapat dibagikan sebagai rujukan MGMP sekolah.",
        rekomendasi: None,
    }),
    (81, FeedbackEntry {
        catatan: "ATP sudah baik, sebagian rumusan tujuan perlu dipertajam.",
        tindak_lanjut: "Revisi rumusan tujuan agar kompetensi dan lingkup materi lebih jelas.",
        rekomendasi: None,
    }),
    (71, FeedbackEntry {
        catatan: "ATP cukup, alur antar tujuan belum sepenuhnya berkesinambungan.",
        tindak_lanjut: "Penyempurnaan alur tujuan melalui kegiatan MGMP/komunitas belajar.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "ATP belum memenuhi komponen minimal penyusunan.",
        tindak_lanjut: "Workshop penyusunan ATP dan pendampingan oleh pengawas/kepala sekolah.",
        rekomendasi: None,
    }),
];

const TELAAH_MODUL_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "Modul ajar sangat lengkap, kegiatan dan asesmen selaras dengan tujuan.",
        tindak_lanjut: "Dipertahankan dan didokumentasikan sebagai contoh praktik baik.",
        rekomendasi: None,
    }),
    (81, FeedbackEntry {
        catatan: "Modul ajar baik, komponen asesmen perlu dilengkapi.",
        tindak_lanjut: "Melengkapi rencana asesmen formatif dan tindak lanjutnya.",
        rekomendasi: None,
    }),
    (71, FeedbackEntry {
        catatan: "Modul ajar cukup, diferensiasi dan refleksi belum tampak.",
        tindak_lanjut: "Pembinaan penyusunan modul ajar berdiferensiasi.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "Modul ajar belum memenuhi komponen minimal.",
        tindak_lanjut: "Pendampingan intensif penyusunan modul ajar.",
        rekomendasi: None,
    }),
];

const OBSERVASI_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "Pelaksanaan pembelajaran sangat baik dari pendahuluan sampai penutup.",
        tindak_lanjut: "Dipertahankan; guru dapat menjadi model pembelajaran bagi rekan sejawat.",
        rekomendasi: Some("Diusulkan membuka kelas berbagi praktik baik di komunitas belajar."),
    }),
    (81, FeedbackEntry {
        catatan: "Pembelajaran berjalan baik, partisipasi peserta didik perlu ditingkatkan.",
        tindak_lanjut: "Menerapkan metode yang lebih melibatkan peserta didik secara aktif.",
        rekomendasi: Some("Mengikuti pelatihan pembelajaran aktif/kooperatif."),
    }),
    (71, FeedbackEntry {
        catatan: "Pembelajaran cukup, pengelolaan waktu dan media belum optimal.",
        tindak_lanjut: "Pembimbingan perencanaan skenario dan pemanfaatan media pembelajaran.",
        rekomendasi: Some("Observasi kelas rekan sejawat yang lebih berpengalaman."),
    }),
    (0, FeedbackEntry {
        catatan: "Pelaksanaan pembelajaran masih kurang dan belum sesuai rencana.",
        tindak_lanjut: "Supervisi klinis dan pendampingan intensif oleh kepala sekolah.",
        rekomendasi: Some("Mengikuti diklat kompetensi pedagogik."),
    }),
];

const PENILAIAN_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "Sistem penilaian sangat baik, terencana dan terdokumentasi lengkap.",
        tindak_lanjut: "Dipertahankan dan hasil analisis dimanfaatkan untuk perbaikan pembelajaran.",
        rekomendasi: None,
    }),
    (81, FeedbackEntry {
        catatan: "Penilaian sudah baik, analisis hasil belum konsisten.",
        tindak_lanjut: "Melaksanakan analisis hasil penilaian setiap selesai asesmen sumatif.",
        rekomendasi: None,
    }),
    (71, FeedbackEntry {
        catatan: "Penilaian cukup, program remedial dan pengayaan belum berjalan.",
        tindak_lanjut: "Menyusun dan melaksanakan program remedial/pengayaan terjadwal.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "Sistem penilaian belum terencana dengan baik.",
        tindak_lanjut: "Pendampingan penyusunan perangkat dan pengolahan penilaian.",
        rekomendasi: None,
    }),
];

// Staff administration banks on raw score (max 30), not percentage.
const ADMINISTRASI_PTT_BANK: &[(i64, FeedbackEntry)] = &[
    (27, FeedbackEntry {
        catatan: "Administrasi ketatausahaan sangat baik dan tertib.",
        tindak_lanjut: "Dipertahankan; dapat membimbing pegawai lain.",
        rekomendasi: None,
    }),
    (24, FeedbackEntry {
        catatan: "Administrasi ketatausahaan baik, sebagian arsip perlu ditata ulang.",
        tindak_lanjut: "Penataan arsip dan pemutakhiran data pokok.",
        rekomendasi: None,
    }),
    (18, FeedbackEntry {
        catatan: "Administrasi ketatausahaan cukup, kelengkapan dokumen belum konsisten.",
        tindak_lanjut: "Pembinaan rutin oleh kepala tenaga administrasi.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "Administrasi ketatausahaan masih kurang.",
        tindak_lanjut: "Pendampingan intensif dan supervisi ulang bulan berikutnya.",
        rekomendasi: None,
    }),
];

const EKSTRAKURIKULER_BANK: &[(i64, FeedbackEntry)] = &[
    (91, FeedbackEntry {
        catatan: "Pengelolaan ekstrakurikuler sangat baik, program dan dokumentasi lengkap.",
        tindak_lanjut: "Dipertahankan dan prestasi ditingkatkan ke jenjang lebih tinggi.",
        rekomendasi: None,
    }),
    (81, FeedbackEntry {
        catatan: "Pengelolaan ekstrakurikuler baik, dokumentasi kegiatan perlu dilengkapi.",
        tindak_lanjut: "Melengkapi jurnal dan laporan kegiatan secara rutin.",
        rekomendasi: None,
    }),
    (71, FeedbackEntry {
        catatan: "Pengelolaan ekstrakurikuler cukup, kehadiran pembina belum konsisten.",
        tindak_lanjut: "Penegasan jadwal dan monitoring kehadiran pembina.",
        rekomendasi: None,
    }),
    (0, FeedbackEntry {
        catatan: "Pengelolaan ekstrakurikuler masih kurang terprogram.",
        tindak_lanjut: "Penyusunan ulang program kerja bersama wakil kepala kesiswaan.",
        rekomendasi: None,
    }),
];

static CATALOG: [InstrumentDef; 7] = [
    InstrumentDef {
        kind: InstrumentKind::LessonAdmin,
        title: "Administrasi Pembelajaran",
        items: ADMINISTRASI_ITEMS,
        domain: ItemDomain::Numeric { max: 2 },
        max_score: 26.0,
        composite: true,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: ADMINISTRASI_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::AtpReview,
        title: "Telaah ATP",
        items: TELAAH_ATP_ITEMS,
        domain: ItemDomain::Numeric { max: 2 },
        max_score: 24.0,
        composite: true,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: TELAAH_ATP_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::ModuleReview,
        title: "Telaah Modul Ajar",
        items: TELAAH_MODUL_ITEMS,
        domain: ItemDomain::Numeric { max: 2 },
        max_score: 34.0,
        composite: true,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: TELAAH_MODUL_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::ClassObservation,
        title: "Observasi Pembelajaran",
        items: OBSERVASI_ITEMS,
        domain: ItemDomain::Numeric { max: 2 },
        max_score: 46.0,
        composite: true,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: OBSERVASI_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::Assessment,
        title: "Penilaian Pembelajaran",
        items: PENILAIAN_ITEMS,
        domain: ItemDomain::Numeric { max: 4 },
        max_score: 48.0,
        composite: true,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: PENILAIAN_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::StaffAdmin,
        title: "Administrasi Tenaga Kependidikan",
        items: ADMINISTRASI_PTT_ITEMS,
        domain: ItemDomain::Letter,
        max_score: 30.0,
        composite: false,
        bank: FeedbackBank {
            input: FeedbackInput::RawScore,
            table: ADMINISTRASI_PTT_BANK,
        },
    },
    InstrumentDef {
        kind: InstrumentKind::Extracurricular,
        title: "Supervisi Ekstrakurikuler",
        items: EKSTRAKURIKULER_ITEMS,
        domain: ItemDomain::YesNo,
        max_score: 30.0,
        composite: false,
        bank: FeedbackBank {
            input: FeedbackInput::Percentage,
            table: EKSTRAKURIKULER_BANK,
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_scores_match_item_counts_and_domains() {
        for def in catalog() {
            let per_item = match def.domain {
                ItemDomain::Numeric { max } => max as f64,
                ItemDomain::Letter | ItemDomain::YesNo => 3.0,
            };
            assert_eq!(
                def.max_score,
                per_item * def.items.len() as f64,
                "instrument {}",
                def.kind.as_str()
            );
        }
    }

    #[test]
    fn five_teaching_instruments_feed_the_composite() {
        assert_eq!(composite_kinds().count(), 5);
    }

    #[test]
    fn kind_ids_round_trip() {
        for def in catalog() {
            assert_eq!(InstrumentKind::from_str(def.kind.as_str()), Some(def.kind));
        }
        assert_eq!(InstrumentKind::from_str("nope"), None);
    }

    #[test]
    fn domain_validation_bounds_values() {
        let numeric = ItemDomain::Numeric { max: 2 };
        assert!(numeric.accepts("0"));
        assert!(numeric.accepts("2"));
        assert!(!numeric.accepts("3"));
        assert!(!numeric.accepts("-1"));
        assert!(!numeric.accepts("x"));

        assert!(ItemDomain::Letter.accepts("b"));
        assert!(!ItemDomain::Letter.accepts("YA"));
        assert!(ItemDomain::YesNo.accepts("TIDAK"));
        assert!(!ItemDomain::YesNo.accepts("K"));
    }

    #[test]
    fn staff_admin_bank_selects_on_raw_score() {
        let def = find(InstrumentKind::StaffAdmin);
        // 27/30 raw picks the top band even though the percentage is 90.
        let top = def.bank.select(90, 27.0);
        assert!(top.catatan.contains("sangat baik"));
        let low = def.bank.select(50, 15.0);
        assert!(low.tindak_lanjut.contains("Pendampingan"));
    }

    #[test]
    fn observation_bank_carries_recommendations() {
        let def = find(InstrumentKind::ClassObservation);
        for (_, entry) in def.bank.table {
            assert!(entry.rekomendasi.is_some());
        }
    }
}
